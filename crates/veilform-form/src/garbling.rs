//! Garbling parameters: which questions get randomized-response protection
//! and how.
//!
//! Block garbling draws shocks from shared mini-batches rather than
//! independently, so realized garbling rates are exact per consumed batch.
//! Only the rates with a small exact batch are allowed for block schemes.

use crate::spec::NodeSpec;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use veilform_common::{SurveyError, SurveyResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GarblingScheme {
    /// Independent draw per respondent.
    Iid,
    /// One shared block per question.
    PopulationBlock,
    /// One shared block per question and covariate value.
    CovariateBlock,
}

/// Garbling parameters of one question.
#[derive(Debug, Clone, PartialEq)]
pub struct GarblingParams {
    /// Name of the survey element to be garbled.
    pub question: String,
    /// Name (not label) of the choice option to garble *into*, typically
    /// the "yes" option.
    pub answer: String,
    /// Garbling probability.
    pub rate: f64,
    /// Covariate field for blocked schemes; `"*"` blocks on the whole
    /// population.
    pub covariate: Option<String>,
}

impl GarblingParams {
    pub fn scheme(&self) -> GarblingScheme {
        match self.covariate.as_deref() {
            None | Some("") => GarblingScheme::Iid,
            Some("*") => GarblingScheme::PopulationBlock,
            Some(_) => GarblingScheme::CovariateBlock,
        }
    }
}

/// Shock mini-batch per supported block-garbling rate. Consuming one full
/// batch realizes the rate exactly; batches are shuffled before use.
static BLOCK_SHOCK_BATCHES: Lazy<Vec<(f64, Vec<bool>)>> = Lazy::new(|| {
    let batch = |trues: usize, falses: usize| {
        let mut shocks = vec![true; trues];
        shocks.extend(std::iter::repeat_n(false, falses));
        shocks
    };
    vec![
        (0.2, batch(1, 4)),
        (0.25, batch(1, 3)),
        (0.4, batch(2, 3)),
        (0.5, batch(1, 1)),
        (0.6, batch(3, 2)),
        (0.75, batch(3, 1)),
        (0.8, batch(4, 1)),
    ]
});

/// The refill batch for a block-garbling rate, or `None` when the rate has
/// no exact small batch.
pub fn shock_batch(rate: f64) -> Option<&'static [bool]> {
    BLOCK_SHOCK_BATCHES
        .iter()
        .find(|(r, _)| *r == rate)
        .map(|(_, batch)| batch.as_slice())
}

fn supported_block_rates() -> Vec<f64> {
    BLOCK_SHOCK_BATCHES.iter().map(|(r, _)| *r).collect()
}

/// Extract and validate the garbling parameters declared in a form tree.
///
/// Garbling must not appear inside a repeat section: the same check runs
/// with and without descending into repeats, and any difference is a
/// validation failure.
pub fn parse_garbling(spec: &NodeSpec) -> SurveyResult<BTreeMap<String, GarblingParams>> {
    let mut all = Vec::new();
    collect_garbled(spec, false, &mut all);
    let mut outside_repeats = Vec::new();
    collect_garbled(spec, true, &mut outside_repeats);
    if all.len() > outside_repeats.len() {
        return Err(SurveyError::form_invalid(
            "garbling must not be applied inside repeats",
        ));
    }

    let mut params = BTreeMap::new();
    for element in outside_repeats {
        let extracted = extract_params(element)?;
        params.insert(extracted.question.clone(), extracted);
    }
    Ok(params)
}

fn collect_garbled<'a>(element: &'a NodeSpec, skip_repeats: bool, out: &mut Vec<&'a NodeSpec>) {
    if skip_repeats && element.is_repeat() {
        return;
    }
    if element.garbling.is_some() {
        out.push(element);
    }
    for child in &element.children {
        collect_garbled(child, skip_repeats, out);
    }
}

fn extract_params(element: &NodeSpec) -> SurveyResult<GarblingParams> {
    let question = element.name.clone();
    let garbling = element
        .garbling
        .as_ref()
        .ok_or_else(|| SurveyError::form_invalid("missing garbling parameters"))?;

    if element.choices.len() != 2 {
        return Err(SurveyError::form_invalid(format!(
            "garbling specified for a non binary-choice question: {question}"
        )));
    }
    if !element.choices.iter().any(|c| c.name == garbling.answer) {
        return Err(SurveyError::form_invalid(format!(
            "{} not in choice options for {question}",
            garbling.answer
        )));
    }

    let rate = garbling.rate.as_f64().ok_or_else(|| {
        SurveyError::form_invalid(format!("garbling rate is not a number on {question}"))
    })?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(SurveyError::form_invalid(
            "garbling rate should be between 0 and 1",
        ));
    }

    let covariate = garbling.covariate.clone().filter(|c| !c.is_empty());
    if covariate.is_some() && shock_batch(rate).is_none() {
        return Err(SurveyError::form_invalid(format!(
            "block garbling supports the following rates only: {:?}",
            supported_block_rates()
        )));
    }

    Ok(GarblingParams {
        question,
        answer: garbling.answer.clone(),
        rate,
        covariate,
    })
}
