//! Meta crate that re-exports the Veilform survey engine's layers.
//!
//! Downstream hosts (HTTP frontends, admin tooling) can depend on this crate
//! alone; the underlying crates remain available when deeper integration is
//! required.
//!
//! The flow: deserialize a form tree ([`form::NodeSpec`]), load and validate
//! it ([`form::load_form`]), drive respondents through it with
//! [`eval::SurveyInterpreter`] over per-respondent [`eval::SurveySession`]s,
//! and submit gathered responses through [`store::Garbler::garble_and_store`],
//! which applies randomized-response garbling and commits atomically against
//! a [`store::SurveyStore`].

pub use veilform_common as common;
pub use veilform_eval as eval;
pub use veilform_form as form;
pub use veilform_parse as parse;
pub use veilform_store as store;

pub use veilform_common::{ResponseMap, ResponseValue, SurveyError, SurveyResult};
pub use veilform_eval::{SessionRegistry, SurveyInterpreter, SurveySession};
pub use veilform_form::{FormTree, NodeSpec, load_form, parse_garbling};
pub use veilform_store::{Garbler, MemoryStore, SurveyStore};

pub mod config;
pub use config::SurveyConfig;
