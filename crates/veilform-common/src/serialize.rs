//! JSON encoding of submitted responses.
//!
//! The wire format is a plain JSON object: text, numbers, booleans, and
//! arrays map directly; `Empty` maps to `null`; dates travel inside an
//! `{"_isoformat": "..."}` envelope so they decode back into date values
//! instead of bare strings.

use crate::error::{SurveyError, SurveyResult};
use crate::value::ResponseValue;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// A gathered survey response: variable name to answer value. Ordered so the
/// serialized form is deterministic.
pub type ResponseMap = BTreeMap<String, ResponseValue>;

const ISOFORMAT_KEY: &str = "_isoformat";
const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn encode_response(response: &ResponseMap) -> SurveyResult<String> {
    let mut object = Map::new();
    for (name, value) in response {
        object.insert(name.clone(), value_to_json(value));
    }
    serde_json::to_string(&Value::Object(object))
        .map_err(|e| SurveyError::PersistenceFailure(e.to_string()))
}

pub fn decode_response(encoded: &str) -> SurveyResult<ResponseMap> {
    let parsed: Value = serde_json::from_str(encoded)
        .map_err(|e| SurveyError::PersistenceFailure(e.to_string()))?;
    let Value::Object(object) = parsed else {
        return Err(SurveyError::PersistenceFailure(
            "response payload is not a JSON object".into(),
        ));
    };
    let mut response = ResponseMap::new();
    for (name, value) in object {
        response.insert(name, json_to_value(value));
    }
    Ok(response)
}

fn value_to_json(value: &ResponseValue) -> Value {
    match value {
        ResponseValue::Text(s) => Value::String(s.clone()),
        ResponseValue::Int(i) => Value::Number((*i).into()),
        ResponseValue::Number(n) => Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ResponseValue::Boolean(b) => Value::Bool(*b),
        ResponseValue::Date(d) => isoformat(d.format(DATE_FORMAT).to_string()),
        ResponseValue::DateTime(dt) => isoformat(dt.format(DATETIME_FORMAT).to_string()),
        ResponseValue::Selection(names) => Value::Array(
            names.iter().map(|n| Value::String(n.clone())).collect(),
        ),
        ResponseValue::List(values) => Value::Array(values.iter().map(value_to_json).collect()),
        ResponseValue::Empty => Value::Null,
    }
}

fn json_to_value(value: Value) -> ResponseValue {
    match value {
        Value::Null => ResponseValue::Empty,
        Value::Bool(b) => ResponseValue::Boolean(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                ResponseValue::Int(i)
            } else {
                ResponseValue::Number(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => ResponseValue::Text(s),
        Value::Array(items) => {
            if items.iter().all(|item| item.is_string()) {
                ResponseValue::Selection(
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            Value::String(s) => Some(s),
                            _ => None,
                        })
                        .collect(),
                )
            } else {
                ResponseValue::List(items.into_iter().map(json_to_value).collect())
            }
        }
        Value::Object(object) => decode_isoformat(object),
    }
}

fn isoformat(text: String) -> Value {
    let mut envelope = Map::new();
    envelope.insert(ISOFORMAT_KEY.to_owned(), Value::String(text));
    Value::Object(envelope)
}

fn decode_isoformat(object: Map<String, Value>) -> ResponseValue {
    let Some(Value::String(text)) = object.get(ISOFORMAT_KEY) else {
        return ResponseValue::Empty;
    };
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, DATETIME_FORMAT) {
        return ResponseValue::DateTime(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, DATE_FORMAT) {
        return ResponseValue::Date(d);
    }
    ResponseValue::Empty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_travel_in_isoformat_envelopes() {
        let mut response = ResponseMap::new();
        response.insert(
            "date.birth".into(),
            ResponseValue::Date(NaiveDate::from_ymd_opt(1990, 4, 2).unwrap()),
        );
        let encoded = encode_response(&response).unwrap();
        assert_eq!(encoded, r#"{"date.birth":{"_isoformat":"1990-04-02"}}"#);
        assert_eq!(decode_response(&encoded).unwrap(), response);
    }

    #[test]
    fn roundtrip_covers_scalar_kinds() {
        let mut response = ResponseMap::new();
        response.insert("name".into(), ResponseValue::from("Ada"));
        response.insert("age".into(), ResponseValue::Int(37));
        response.insert("height".into(), ResponseValue::Number(1.7));
        response.insert("consented".into(), ResponseValue::Boolean(true));
        response.insert("skipped".into(), ResponseValue::Empty);
        response.insert(
            "hobbies".into(),
            ResponseValue::Selection(vec!["chess".into(), "running".into()]),
        );
        let encoded = encode_response(&response).unwrap();
        assert_eq!(decode_response(&encoded).unwrap(), response);
    }

    #[test]
    fn mixed_arrays_decode_as_lists() {
        let decoded = decode_response(r#"{"xs": [1, "a", null]}"#).unwrap();
        assert_eq!(
            decoded["xs"],
            ResponseValue::List(vec![
                ResponseValue::Int(1),
                ResponseValue::Text("a".into()),
                ResponseValue::Empty,
            ])
        );
    }
}
