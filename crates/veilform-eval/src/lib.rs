//! Session state and the survey interpreter.
//!
//! [`session::SurveySession`] is the per-respondent store: selected language,
//! visit history (the last entry is the cursor), response values, and the
//! assisting enumerator. [`interpreter::SurveyInterpreter`] walks the form
//! tree as a state machine over that session, evaluating `relevant`,
//! `constraint`, and `calculate` formulas through [`evaluator::Evaluator`].
//! [`registry::SessionRegistry`] owns sessions by respondent key and provides
//! the idle-eviction hook for a host scheduler.

pub mod evaluator;
pub mod interpreter;
pub mod registry;
pub mod session;

pub use evaluator::Evaluator;
pub use interpreter::{REPEAT_SUFFIX, SurveyInterpreter, repeat_varname};
pub use registry::SessionRegistry;
pub use session::SurveySession;
