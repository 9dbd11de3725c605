use std::collections::BTreeMap;
use veilform_common::SurveyError;
use veilform_store::{
    BlockRow, MemoryStore, RespondentStatus, StoreTransaction, SubmissionRow, SurveyStore,
};

fn submission(respondent_uuid: &str, response: &str) -> SubmissionRow {
    SubmissionRow {
        id: 0,
        response: response.to_owned(),
        respondent_uuid: respondent_uuid.to_owned(),
        enumerator_uuid: None,
    }
}

#[test]
fn interleaved_commits_on_one_block_fail_the_loser() {
    let store = MemoryStore::new();
    let rows: Vec<BTreeMap<String, String>> = ["r-1", "r-2"]
        .iter()
        .map(|uuid| {
            let mut row = BTreeMap::new();
            row.insert("uuid".to_owned(), uuid.to_string());
            row
        })
        .collect();
    store.add_respondents(rows).unwrap();

    // Pre-populate the block
    let mut tx = store.begin();
    let mut block = BlockRow::new("test_block");
    block.shocks = vec![true, false];
    tx.stage_block(block);
    tx.commit().unwrap();

    // Two transactions read the same block state
    let block1 = store.block("test_block").unwrap().unwrap();
    let block2 = store.block("test_block").unwrap().unwrap();
    assert_eq!(block1.version, 1);
    assert_eq!(block2.version, 1);

    // The first commit wins
    let mut tx1 = store.begin();
    let mut updated = block1;
    updated.shocks = vec![true];
    tx1.stage_block(updated);
    tx1.stage_submission(submission("r-1", "response1"));
    tx1.stage_respondent_status("r-1", RespondentStatus::Complete);
    tx1.commit().unwrap();

    // The second commit read a stale version and must fail wholesale
    let mut tx2 = store.begin();
    let mut updated = block2;
    updated.shocks = vec![true];
    tx2.stage_block(updated);
    tx2.stage_submission(submission("r-2", "response2"));
    tx2.stage_respondent_status("r-2", RespondentStatus::Complete);
    assert_eq!(tx2.commit().unwrap_err(), SurveyError::ConcurrencyConflict);

    // Durable state holds exactly the winner's effects
    let block = store.block("test_block").unwrap().unwrap();
    assert_eq!(block.version, 2);
    assert_eq!(block.shocks, vec![true]);
    let submissions = store.submissions().unwrap();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].response, "response1");
    assert_eq!(
        store.respondent("r-1").unwrap().unwrap().status,
        RespondentStatus::Complete
    );
    assert_eq!(
        store.respondent("r-2").unwrap().unwrap().status,
        RespondentStatus::Incomplete
    );
}
