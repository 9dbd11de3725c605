//! Per-respondent session state.
//!
//! A session is exclusively owned by its respondent and mutated only through
//! the interpreter. Reads of compound values return clones so external
//! handling cannot corrupt stored state; every write flips a modified flag
//! that external persistence layers can poll.

use rustc_hash::FxHashMap;
use veilform_common::{ResponseMap, ResponseValue};

#[derive(Debug, Default)]
pub struct SurveySession {
    language: String,
    visits: Vec<String>,
    values: FxHashMap<String, ResponseValue>,
    enumerator_uuid: Option<String>,
    modified: bool,
}

impl SurveySession {
    pub fn new() -> Self {
        SurveySession::default()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.language = language.into();
        self.modified = true;
    }

    pub fn enumerator_uuid(&self) -> Option<&str> {
        self.enumerator_uuid.as_deref()
    }

    pub fn set_enumerator_uuid(&mut self, uuid: impl Into<String>) {
        self.enumerator_uuid = Some(uuid.into());
        self.modified = true;
    }

    pub fn latest_visit(&self) -> Option<&str> {
        self.visits.last().map(String::as_str)
    }

    pub fn add_visit(&mut self, element_name: impl Into<String>) {
        self.visits.push(element_name.into());
        self.modified = true;
    }

    pub fn drop_latest_visit(&mut self) {
        if self.visits.pop().is_some() {
            self.modified = true;
        }
    }

    /// How many times the given element has been visited so far.
    pub fn count_visits(&self, element_name: &str) -> usize {
        self.visits.iter().filter(|v| *v == element_name).count()
    }

    pub fn all_visits(&self) -> Vec<String> {
        self.visits.clone()
    }

    /// Store a response value; `None` deletes the entry.
    pub fn store_response(&mut self, element_name: &str, value: Option<ResponseValue>) {
        match value {
            Some(value) => {
                self.values.insert(element_name.to_owned(), value);
            }
            None => {
                self.values.remove(element_name);
            }
        }
        self.modified = true;
    }

    pub fn retrieve_response(&self, element_name: &str) -> Option<ResponseValue> {
        self.values.get(element_name).cloned()
    }

    pub fn retrieve_all_responses(&self) -> ResponseMap {
        self.values
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.language.clear();
        self.visits.clear();
        self.values.clear();
        self.enumerator_uuid = None;
        self.modified = true;
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Read and reset the modified flag (for persistence sweeps).
    pub fn take_modified(&mut self) -> bool {
        std::mem::take(&mut self.modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storing_none_deletes() {
        let mut session = SurveySession::new();
        session.store_response("q", Some(ResponseValue::Int(1)));
        assert_eq!(session.retrieve_response("q"), Some(ResponseValue::Int(1)));
        session.store_response("q", None);
        assert_eq!(session.retrieve_response("q"), None);
    }

    #[test]
    fn reads_return_copies() {
        let mut session = SurveySession::new();
        session.store_response(
            "xs",
            Some(ResponseValue::List(vec![ResponseValue::Int(1)])),
        );
        let mut copy = session.retrieve_response("xs").unwrap();
        if let ResponseValue::List(items) = &mut copy {
            items.push(ResponseValue::Int(2));
        }
        assert_eq!(
            session.retrieve_response("xs"),
            Some(ResponseValue::List(vec![ResponseValue::Int(1)]))
        );
    }

    #[test]
    fn visit_history_counts_and_pops() {
        let mut session = SurveySession::new();
        session.add_visit("root");
        session.add_visit("loop");
        session.add_visit("loop");
        assert_eq!(session.count_visits("loop"), 2);
        assert_eq!(session.latest_visit(), Some("loop"));
        session.drop_latest_visit();
        assert_eq!(session.count_visits("loop"), 1);
    }

    #[test]
    fn writes_flip_the_modified_flag() {
        let mut session = SurveySession::new();
        assert!(!session.is_modified());
        session.set_language("english");
        assert!(session.take_modified());
        assert!(!session.is_modified());
    }
}
