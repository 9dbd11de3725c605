//! Roster import.
//!
//! Rosters are CSV files with a header row; every column becomes an
//! attribute of the respective entity. A `uuid` column is honored when
//! present and synthesized otherwise. Import is all-or-nothing: rows are
//! fully parsed before any insert happens.

use crate::store::SurveyStore;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;
use veilform_common::{SurveyError, SurveyResult};

pub fn load_respondent_roster(
    store: &dyn SurveyStore,
    reader: impl Read,
) -> SurveyResult<usize> {
    let rows = parse_roster(reader)?;
    let count = store.add_respondents(rows)?;
    info!(count, "respondent roster loaded");
    Ok(count)
}

pub fn load_enumerator_roster(store: &dyn SurveyStore, reader: impl Read) -> SurveyResult<usize> {
    let rows = parse_roster(reader)?;
    let count = store.add_enumerators(rows)?;
    info!(count, "enumerator roster loaded");
    Ok(count)
}

pub fn load_respondent_roster_file(
    store: &dyn SurveyStore,
    path: impl AsRef<Path>,
) -> SurveyResult<usize> {
    load_respondent_roster(store, open(path)?)
}

pub fn load_enumerator_roster_file(
    store: &dyn SurveyStore,
    path: impl AsRef<Path>,
) -> SurveyResult<usize> {
    load_enumerator_roster(store, open(path)?)
}

fn open(path: impl AsRef<Path>) -> SurveyResult<File> {
    File::open(path.as_ref()).map_err(|e| {
        SurveyError::PersistenceFailure(format!(
            "cannot open roster {}: {e}",
            path.as_ref().display()
        ))
    })
}

fn parse_roster(reader: impl Read) -> SurveyResult<Vec<BTreeMap<String, String>>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader
        .headers()
        .map_err(|e| SurveyError::PersistenceFailure(format!("malformed roster header: {e}")))?
        .clone();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record
            .map_err(|e| SurveyError::PersistenceFailure(format!("malformed roster row: {e}")))?;
        let mut attributes = BTreeMap::new();
        for (column, value) in headers.iter().zip(record.iter()) {
            attributes.insert(column.to_owned(), value.to_owned());
        }
        rows.push(attributes);
    }
    Ok(rows)
}
