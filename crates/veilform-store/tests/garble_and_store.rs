use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::collections::BTreeMap;
use veilform_common::{ResponseMap, ResponseValue, SurveyError, decode_response};
use veilform_form::GarblingParams;
use veilform_store::{Garbler, MemoryStore, RespondentStatus, SurveyStore};

fn seeded_garbler(params: GarblingParams) -> Garbler {
    let mut table = BTreeMap::new();
    table.insert(params.question.clone(), params);
    Garbler::with_rng(table, SmallRng::seed_from_u64(42))
}

fn add_respondents(store: &MemoryStore, count: usize) -> Vec<String> {
    let rows: Vec<BTreeMap<String, String>> = (0..count)
        .map(|i| {
            let mut row = BTreeMap::new();
            row.insert("uuid".to_owned(), format!("r-{i}"));
            row
        })
        .collect();
    store.add_respondents(rows).unwrap();
    (0..count).map(|i| format!("r-{i}")).collect()
}

fn single_answer(question: &str, value: &str) -> ResponseMap {
    let mut response = ResponseMap::new();
    response.insert(question.to_owned(), ResponseValue::from(value));
    response
}

fn count_garbled(store: &MemoryStore, question: &str, answer: &str) -> usize {
    store
        .submissions()
        .unwrap()
        .iter()
        .filter(|s| {
            let response = decode_response(&s.response).unwrap();
            response.get(question) == Some(&ResponseValue::from(answer))
        })
        .count()
}

#[test]
fn iid_garbling_at_full_rate_flips_every_answer() {
    let store = MemoryStore::new();
    let respondents = add_respondents(&store, 10);
    let mut garbler = seeded_garbler(GarblingParams {
        question: "question".into(),
        answer: "yes".into(),
        rate: 1.0,
        covariate: None,
    });

    for uuid in &respondents {
        garbler
            .garble_and_store(&store, single_answer("question", "no"), uuid, None)
            .unwrap();
    }
    assert_eq!(count_garbled(&store, "question", "yes"), 10);
}

#[test]
fn truthful_protected_answers_are_never_changed() {
    let store = MemoryStore::new();
    let respondents = add_respondents(&store, 10);
    let mut garbler = seeded_garbler(GarblingParams {
        question: "question".into(),
        answer: "yes".into(),
        rate: 1.0,
        covariate: None,
    });

    for uuid in &respondents {
        garbler
            .garble_and_store(&store, single_answer("question", "yes"), uuid, None)
            .unwrap();
    }
    assert_eq!(count_garbled(&store, "question", "yes"), 10);
}

#[test]
fn block_garbling_realizes_its_rate_exactly() {
    for (rate, expected) in [(0.2, 2), (0.4, 4), (0.5, 5), (0.6, 6), (0.8, 8)] {
        let store = MemoryStore::new();
        let respondents = add_respondents(&store, 10);
        let mut garbler = seeded_garbler(GarblingParams {
            question: "question".into(),
            answer: "yes".into(),
            rate,
            covariate: Some("*".into()),
        });

        for uuid in &respondents {
            garbler
                .garble_and_store(&store, single_answer("question", "no"), uuid, None)
                .unwrap();
        }
        assert_eq!(
            count_garbled(&store, "question", "yes"),
            expected,
            "rate {rate}"
        );
    }
}

#[test]
fn block_versions_increase_by_one_per_submission() {
    let store = MemoryStore::new();
    let respondents = add_respondents(&store, 7);
    let mut garbler = seeded_garbler(GarblingParams {
        question: "question".into(),
        answer: "yes".into(),
        rate: 0.5,
        covariate: Some("*".into()),
    });

    for (i, uuid) in respondents.iter().enumerate() {
        garbler
            .garble_and_store(&store, single_answer("question", "no"), uuid, None)
            .unwrap();
        let block = store.block("question").unwrap().unwrap();
        assert_eq!(block.version, (i + 1) as u64);
    }
}

#[test]
fn submissions_mark_respondents_complete() {
    let store = MemoryStore::new();
    let respondents = add_respondents(&store, 2);
    let mut garbler = seeded_garbler(GarblingParams {
        question: "question".into(),
        answer: "yes".into(),
        rate: 0.5,
        covariate: None,
    });

    garbler
        .garble_and_store(&store, single_answer("question", "no"), &respondents[0], None)
        .unwrap();
    assert_eq!(
        store.respondent(&respondents[0]).unwrap().unwrap().status,
        RespondentStatus::Complete
    );
    assert_eq!(
        store.respondent(&respondents[1]).unwrap().unwrap().status,
        RespondentStatus::Incomplete
    );
}

#[test]
fn resubmission_is_rejected() {
    let store = MemoryStore::new();
    let respondents = add_respondents(&store, 1);
    let mut garbler = seeded_garbler(GarblingParams {
        question: "question".into(),
        answer: "yes".into(),
        rate: 0.5,
        covariate: None,
    });

    garbler
        .garble_and_store(&store, single_answer("question", "no"), &respondents[0], None)
        .unwrap();
    let err = garbler
        .garble_and_store(&store, single_answer("question", "no"), &respondents[0], None)
        .unwrap_err();
    assert_eq!(err, SurveyError::Resubmission);
    assert_eq!(store.submissions().unwrap().len(), 1);
}

#[test]
fn covariate_blocks_are_keyed_by_covariate_value() {
    let store = MemoryStore::new();
    let rows: Vec<BTreeMap<String, String>> = (0..10)
        .map(|i| {
            let mut row = BTreeMap::new();
            row.insert("uuid".to_owned(), format!("r-{i}"));
            row.insert(
                "team".to_owned(),
                if i < 5 { "alpha" } else { "beta" }.to_owned(),
            );
            row
        })
        .collect();
    store.add_respondents(rows).unwrap();

    let mut garbler = seeded_garbler(GarblingParams {
        question: "question".into(),
        answer: "yes".into(),
        rate: 0.4,
        covariate: Some("team".into()),
    });
    for i in 0..10 {
        garbler
            .garble_and_store(&store, single_answer("question", "no"), &format!("r-{i}"), None)
            .unwrap();
    }

    // One exact batch consumed per team
    assert_eq!(count_garbled(&store, "question", "yes"), 4);
    assert_eq!(store.block("question::alpha").unwrap().unwrap().version, 5);
    assert_eq!(store.block("question::beta").unwrap().unwrap().version, 5);
    assert!(store.block("question").unwrap().is_none());
}

#[test]
fn missing_covariates_drop_the_answer_but_keep_the_rest() {
    let store = MemoryStore::new();
    let mut row = BTreeMap::new();
    row.insert("uuid".to_owned(), "r-0".to_owned());
    // `team` column absent entirely
    store.add_respondents(vec![row]).unwrap();

    let mut garbler = seeded_garbler(GarblingParams {
        question: "question".into(),
        answer: "yes".into(),
        rate: 0.4,
        covariate: Some("team".into()),
    });
    let mut response = single_answer("question", "no");
    response.insert("name".into(), ResponseValue::from("Ada"));
    garbler
        .garble_and_store(&store, response, "r-0", None)
        .unwrap();

    let stored = store.submission_for("r-0").unwrap().unwrap();
    let decoded = decode_response(&stored.response).unwrap();
    assert!(!decoded.contains_key("question"));
    assert_eq!(decoded["name"], ResponseValue::from("Ada"));
    assert!(store.block("question::").unwrap().is_none());
}

#[test]
fn enumerator_identity_is_carried_on_the_submission() {
    let store = MemoryStore::new();
    let respondents = add_respondents(&store, 1);
    let mut garbler = seeded_garbler(GarblingParams {
        question: "question".into(),
        answer: "yes".into(),
        rate: 0.5,
        covariate: None,
    });
    garbler
        .garble_and_store(
            &store,
            single_answer("question", "no"),
            &respondents[0],
            Some("e-1"),
        )
        .unwrap();
    let stored = store.submission_for(&respondents[0]).unwrap().unwrap();
    assert_eq!(stored.enumerator_uuid.as_deref(), Some("e-1"));
}
