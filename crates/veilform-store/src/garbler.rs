//! The garbling engine.
//!
//! At submission time, each answer with garbling parameters is transformed
//! with a randomized-response shock: a truthful match of the protected
//! answer is left alone; any other value flips to the protected answer when
//! the shock fires (r̃ = r + (1−r)·η). IID shocks are drawn per respondent;
//! blocked shocks are popped from shared, exactly-proportioned mini-batches
//! stored in versioned block rows. The garbled response, every touched block,
//! and the respondent's completion status commit in one transaction; an
//! interleaved commit on the same block fails the whole submission with
//! `ConcurrencyConflict` and the caller retries.

use crate::model::{BlockRow, RespondentStatus, SubmissionRow};
use crate::store::{StoreTransaction, SurveyStore};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::{debug, info};
use veilform_common::{ResponseMap, ResponseValue, SurveyError, SurveyResult, encode_response};
use veilform_form::{GarblingParams, GarblingScheme, NodeSpec, parse_garbling, shock_batch};

pub struct Garbler {
    params: BTreeMap<String, GarblingParams>,
    rng: SmallRng,
}

impl Garbler {
    pub fn new(params: BTreeMap<String, GarblingParams>) -> Self {
        Garbler {
            params,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Deterministic construction for tests and replayable runs.
    pub fn with_rng(params: BTreeMap<String, GarblingParams>, rng: SmallRng) -> Self {
        Garbler { params, rng }
    }

    /// Derive the garbling table from a parsed form tree.
    pub fn from_form(spec: &NodeSpec) -> SurveyResult<Self> {
        Ok(Garbler::new(parse_garbling(spec)?))
    }

    pub fn params(&self) -> &BTreeMap<String, GarblingParams> {
        &self.params
    }

    /// Garble the marked answers in `response` and persist the result as the
    /// respondent's submission.
    ///
    /// Block-state mutations, the submission insert, and the respondent's
    /// `Complete` status land in a single transaction. Propagates
    /// `ConcurrencyConflict` when another commit interleaved on a shared
    /// block, and `Resubmission` when the respondent already submitted.
    pub fn garble_and_store(
        &mut self,
        store: &dyn SurveyStore,
        mut response: ResponseMap,
        respondent_uuid: &str,
        enumerator_uuid: Option<&str>,
    ) -> SurveyResult<()> {
        let mut tx = store.begin();
        let respondent = store.respondent(respondent_uuid)?;
        let params: Vec<GarblingParams> = self.params.values().cloned().collect();

        for param in &params {
            let Some(value) = response.get(&param.question).map(|v| v.to_string()) else {
                continue;
            };
            let shock = match param.scheme() {
                GarblingScheme::Iid => self.rng.r#gen::<f64>() < param.rate,
                GarblingScheme::PopulationBlock => {
                    self.draw_block_shock(store, tx.as_mut(), param.question.clone(), param.rate)?
                }
                GarblingScheme::CovariateBlock => {
                    let covariate = param.covariate.as_deref().unwrap_or_default();
                    let Some(covariate_value) =
                        respondent.as_ref().and_then(|r| r.attribute(covariate))
                    else {
                        // No covariate value: the answer must not be stored
                        // at all, garbled or otherwise
                        debug!(
                            question = %param.question,
                            covariate,
                            "covariate missing; dropping answer"
                        );
                        response.remove(&param.question);
                        continue;
                    };
                    let key = format!("{}::{}", param.question, covariate_value);
                    self.draw_block_shock(store, tx.as_mut(), key, param.rate)?
                }
            };

            let garbled = garble_response(&value, shock, &param.answer);
            response.insert(param.question.clone(), ResponseValue::Text(garbled));
        }

        let encoded = encode_response(&response)?;
        tx.stage_submission(SubmissionRow {
            id: 0,
            response: encoded,
            respondent_uuid: respondent_uuid.to_owned(),
            enumerator_uuid: enumerator_uuid.map(str::to_owned),
        });
        tx.stage_respondent_status(respondent_uuid, RespondentStatus::Complete);
        tx.commit()?;
        info!(respondent = %respondent_uuid, "survey response stored");
        Ok(())
    }

    /// Pop one shock from the named block, refilling the mini-batch when it
    /// runs dry. The staged row carries the version it was read at; commit
    /// enforces that it is still current.
    fn draw_block_shock(
        &mut self,
        store: &dyn SurveyStore,
        tx: &mut dyn StoreTransaction,
        block_name: String,
        rate: f64,
    ) -> SurveyResult<bool> {
        let mut block = store
            .block(&block_name)?
            .unwrap_or_else(|| BlockRow::new(block_name));
        if block.shocks.is_empty() {
            let batch = shock_batch(rate).ok_or_else(|| SurveyError::FormInvalid {
                reason: format!("no shock batch for block garbling rate {rate}"),
            })?;
            block.shocks = batch.to_vec();
        }
        block.shocks.shuffle(&mut self.rng);
        let shock = block.shocks.pop().ok_or_else(|| {
            SurveyError::PersistenceFailure("empty shock batch".into())
        })?;
        tx.stage_block(block);
        Ok(shock)
    }
}

/// The garbling transform on one binary answer.
fn garble_response(response_value: &str, shock: bool, answer: &str) -> String {
    if response_value == answer || !shock {
        response_value.to_owned()
    } else {
        answer.to_owned()
    }
}
