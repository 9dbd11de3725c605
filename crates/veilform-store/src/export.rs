//! CSV export of submitted responses.

use crate::store::SurveyStore;
use std::collections::BTreeSet;
use veilform_common::{SurveyError, SurveyResult, decode_response};

const RESPONDENT_UUID: &str = "respondent_uuid";
const ENUMERATOR_UUID: &str = "enumerator_uuid";

/// Arrange all submitted survey responses into one CSV string.
///
/// The header is `respondent_uuid, enumerator_uuid` followed by every
/// variable name encountered across submissions in lexicographic order; one
/// row per submission; missing cells are empty. Returns an empty string when
/// no submission exists yet.
pub fn export_submissions_csv(store: &dyn SurveyStore) -> SurveyResult<String> {
    let submissions = store.submissions()?;
    if submissions.is_empty() {
        return Ok(String::new());
    }

    let mut decoded = Vec::with_capacity(submissions.len());
    let mut variable_names = BTreeSet::new();
    for submission in &submissions {
        let response = decode_response(&submission.response)?;
        variable_names.extend(response.keys().cloned());
        decoded.push((submission, response));
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header = vec![RESPONDENT_UUID.to_owned(), ENUMERATOR_UUID.to_owned()];
    header.extend(variable_names.iter().cloned());
    writer
        .write_record(&header)
        .map_err(|e| SurveyError::PersistenceFailure(e.to_string()))?;

    for (submission, response) in decoded {
        let mut row = vec![
            submission.respondent_uuid.clone(),
            submission.enumerator_uuid.clone().unwrap_or_default(),
        ];
        for name in &variable_names {
            row.push(
                response
                    .get(name)
                    .map(|value| value.to_string())
                    .unwrap_or_default(),
            );
        }
        writer
            .write_record(&row)
            .map_err(|e| SurveyError::PersistenceFailure(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| SurveyError::PersistenceFailure(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| SurveyError::PersistenceFailure(e.to_string()))
}
