//! Row types for durable survey state.

use std::collections::BTreeMap;

/// Completion status of one respondent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespondentStatus {
    Incomplete,
    Complete,
}

/// Survey lifecycle state, kept in global storage. Ending the survey drops
/// every garbling block so residual shocks cannot deanonymize late batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurveyPhase {
    Active,
    Paused,
    Ended,
}

/// A respondent loaded from the roster. Every roster column becomes an
/// attribute; `uuid` is synthesized when the roster lacks one.
#[derive(Debug, Clone)]
pub struct RespondentRow {
    pub id: u64,
    pub uuid: String,
    pub status: RespondentStatus,
    /// Enumerator assigned to assist this respondent, when any.
    pub enumerator_uuid: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

impl RespondentRow {
    /// A covariate read: the named attribute, empty values treated as
    /// missing.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct EnumeratorRow {
    pub id: u64,
    pub uuid: String,
    pub attributes: BTreeMap<String, String>,
}

/// One submitted (already garbled) response. Rows are append-only and unique
/// per respondent; they are never mutated after insert.
#[derive(Debug, Clone)]
pub struct SubmissionRow {
    pub id: u64,
    /// Serialized response object (JSON).
    pub response: String,
    pub respondent_uuid: String,
    pub enumerator_uuid: Option<String>,
}

/// Shared garbling-block state: the remaining pre-generated shocks and the
/// optimistic-lock version counter. `version` is 0 until the first commit;
/// every commit that consumes from the block increments it by one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRow {
    pub id: u64,
    pub name: String,
    pub shocks: Vec<bool>,
    pub version: u64,
}

impl BlockRow {
    pub fn new(name: impl Into<String>) -> Self {
        BlockRow {
            id: 0,
            name: name.into(),
            shocks: Vec::new(),
            version: 0,
        }
    }
}
