//! The parsed-tree input format.
//!
//! [`NodeSpec`] matches the dictionary shape produced by XLSForm-to-JSON
//! conversion: each record carries `name`, `type`, optional `label`/`hint`
//! (plain or per-language), a `bind` bag, a `control` bag, `choices` for
//! choice questions, an optional `garbling` block, and `children`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use veilform_common::{SurveyError, SurveyResult};

/// A text field: a single string or a language → string mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextSpec {
    Plain(String),
    Translated(BTreeMap<String, String>),
}

impl TextSpec {
    /// Languages this field is available in (empty for plain text).
    pub fn languages(&self) -> Vec<String> {
        match self {
            TextSpec::Plain(_) => Vec::new(),
            TextSpec::Translated(map) => map.keys().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindSpec {
    #[serde(default)]
    pub relevant: Option<String>,
    #[serde(default)]
    pub constraint: Option<String>,
    #[serde(default, rename = "jr:constraintMsg")]
    pub constraint_message: Option<TextSpec>,
    #[serde(default)]
    pub required: Option<String>,
    #[serde(default)]
    pub calculate: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlSpec {
    #[serde(default, rename = "jr:count")]
    pub count: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceSpec {
    pub name: String,
    #[serde(default)]
    pub label: Option<TextSpec>,
}

/// Garbling rates arrive as spreadsheet cells, so both `"0.4"` and `0.4`
/// must deserialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RateSpec {
    Text(String),
    Number(f64),
}

impl RateSpec {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RateSpec::Text(s) => s.trim().parse().ok(),
            RateSpec::Number(n) => Some(*n),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GarblingSpec {
    pub answer: String,
    pub rate: RateSpec,
    #[serde(default)]
    pub covariate: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub label: Option<TextSpec>,
    #[serde(default)]
    pub hint: Option<TextSpec>,
    #[serde(default)]
    pub bind: BindSpec,
    #[serde(default)]
    pub control: ControlSpec,
    #[serde(default)]
    pub choices: Vec<ChoiceSpec>,
    #[serde(default)]
    pub garbling: Option<GarblingSpec>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
    /// Declared on the survey root only.
    #[serde(default)]
    pub default_language: Option<String>,
}

impl NodeSpec {
    /// Deserialize a form tree from XLSForm-to-JSON output.
    pub fn from_json(text: &str) -> SurveyResult<NodeSpec> {
        serde_json::from_str(text).map_err(|e| SurveyError::FormInvalid {
            reason: format!("malformed form JSON: {e}"),
        })
    }

    pub fn is_repeat(&self) -> bool {
        self.node_type == "repeat"
    }
}
