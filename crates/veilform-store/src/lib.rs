//! Durable state and the garbling engine.
//!
//! [`store::SurveyStore`] abstracts row-level storage of respondents,
//! enumerators, garbling blocks (with optimistic version counters), and
//! submitted responses behind transactional commit/rollback;
//! [`store::MemoryStore`] is the in-process implementation. The
//! [`garbler::Garbler`] transforms sensitive answers at submission time and
//! commits the garbled response together with block-state mutations and the
//! respondent's completion status in one transaction. [`roster`] imports
//! respondent/enumerator CSVs; [`export`] renders all submissions as CSV.

pub mod export;
pub mod garbler;
pub mod model;
pub mod roster;
pub mod store;

pub use export::export_submissions_csv;
pub use garbler::Garbler;
pub use model::{
    BlockRow, EnumeratorRow, RespondentRow, RespondentStatus, SubmissionRow, SurveyPhase,
};
pub use roster::{load_enumerator_roster, load_respondent_roster};
pub use store::{MemoryStore, StoreTransaction, SurveyStore};
