use chrono::{NaiveDate, NaiveDateTime};
use std::cmp::Ordering;
use std::fmt::{self, Display};

/// A typed survey answer value.
///
/// This is the single value representation flowing through the whole engine:
/// session storage, formula evaluation, response assembly, and garbling all
/// speak `ResponseValue`. `Empty` stands for "no answer" (`null` on the
/// wire); `List` holds the per-iteration auxiliary stores that repeat
/// sections maintain.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseValue {
    Text(String),
    Int(i64),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Choice names picked in a select-multiple question.
    Selection(Vec<String>),
    /// Ordered per-iteration values of a repeat descendant.
    List(Vec<ResponseValue>),
    Empty,
}

impl Display for ResponseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseValue::Text(s) => write!(f, "{s}"),
            ResponseValue::Int(i) => write!(f, "{i}"),
            ResponseValue::Number(n) => write!(f, "{n}"),
            ResponseValue::Boolean(b) => write!(f, "{b}"),
            ResponseValue::Date(d) => write!(f, "{d}"),
            ResponseValue::DateTime(dt) => write!(f, "{dt}"),
            // XLSForm renders multi-select answers space-separated
            ResponseValue::Selection(names) => write!(f, "{}", names.join(" ")),
            ResponseValue::List(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(", "))
            }
            ResponseValue::Empty => Ok(()),
        }
    }
}

impl ResponseValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, ResponseValue::Empty)
    }

    /// Numeric view used by comparison and arithmetic coercion.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ResponseValue::Int(i) => Some(*i as f64),
            ResponseValue::Number(n) => Some(*n),
            ResponseValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Integer view; `Number` qualifies only when it has no fraction.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ResponseValue::Int(i) => Some(*i),
            ResponseValue::Number(n) if n.fract() == 0.0 => Some(*n as i64),
            _ => None,
        }
    }

    /// Truthiness used when a formula result feeds a boolean slot
    /// (`relevant`, `constraint`). `Empty` is false; numbers are false at
    /// zero; text is false when blank.
    pub fn truthy(&self) -> bool {
        match self {
            ResponseValue::Boolean(b) => *b,
            ResponseValue::Int(i) => *i != 0,
            ResponseValue::Number(n) => *n != 0.0,
            ResponseValue::Text(s) => !s.is_empty(),
            ResponseValue::Selection(names) => !names.is_empty(),
            ResponseValue::List(values) => !values.is_empty(),
            ResponseValue::Date(_) | ResponseValue::DateTime(_) => true,
            ResponseValue::Empty => false,
        }
    }

    /// The choice-name array seen by `selected(...)`-style functions.
    /// A select-one answer acts as a one-element array.
    pub fn as_choice_array(&self) -> Vec<String> {
        match self {
            ResponseValue::Selection(names) => names.clone(),
            ResponseValue::Text(s) => {
                if s.is_empty() {
                    Vec::new()
                } else {
                    s.split_whitespace().map(str::to_owned).collect()
                }
            }
            ResponseValue::List(values) => values.iter().map(|v| v.to_string()).collect(),
            ResponseValue::Empty => Vec::new(),
            other => vec![other.to_string()],
        }
    }

    /// Equality with numeric cross-coercion (`Int(1) == Number(1.0)`).
    pub fn loose_eq(&self, other: &ResponseValue) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a == b;
        }
        self == other
    }

    /// Ordering with numeric cross-coercion; `None` when the kinds are not
    /// comparable (e.g. text against a date).
    pub fn loose_cmp(&self, other: &ResponseValue) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a.partial_cmp(&b);
        }
        match (self, other) {
            (ResponseValue::Text(a), ResponseValue::Text(b)) => Some(a.cmp(b)),
            (ResponseValue::Date(a), ResponseValue::Date(b)) => Some(a.cmp(b)),
            (ResponseValue::DateTime(a), ResponseValue::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<&str> for ResponseValue {
    fn from(s: &str) -> Self {
        ResponseValue::Text(s.to_owned())
    }
}

impl From<String> for ResponseValue {
    fn from(s: String) -> Self {
        ResponseValue::Text(s)
    }
}

impl From<i64> for ResponseValue {
    fn from(i: i64) -> Self {
        ResponseValue::Int(i)
    }
}

impl From<f64> for ResponseValue {
    fn from(n: f64) -> Self {
        ResponseValue::Number(n)
    }
}

impl From<bool> for ResponseValue {
    fn from(b: bool) -> Self {
        ResponseValue::Boolean(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_coercion_crosses_int_and_number() {
        assert!(ResponseValue::Int(1).loose_eq(&ResponseValue::Number(1.0)));
        assert_eq!(
            ResponseValue::Int(2).loose_cmp(&ResponseValue::Number(2.5)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn text_and_date_are_not_comparable() {
        let text = ResponseValue::from("2024-01-01");
        let date = ResponseValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(text.loose_cmp(&date), None);
    }

    #[test]
    fn choice_array_views() {
        let multi = ResponseValue::Selection(vec!["a".into(), "b".into()]);
        assert_eq!(multi.as_choice_array(), vec!["a", "b"]);
        let single = ResponseValue::from("a b");
        assert_eq!(single.as_choice_array(), vec!["a", "b"]);
        assert!(ResponseValue::Empty.as_choice_array().is_empty());
    }

    #[test]
    fn selection_displays_space_separated() {
        let multi = ResponseValue::Selection(vec!["x".into(), "y".into()]);
        assert_eq!(multi.to_string(), "x y");
    }
}
