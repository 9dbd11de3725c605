//! The canonical error surface of the survey engine.
//!
//! One enum carries every failure kind a caller can observe. Validation
//! failures abort form loading; `ConstraintViolated` stays local to a single
//! field; `ConcurrencyConflict` and `Resubmission` surface at submission time
//! without altering durable state; everything else maps to a generic internal
//! failure that leaves session state untouched so the user may retry.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurveyError {
    /// The form tree failed structural validation and cannot be served.
    #[error("invalid form: {reason}")]
    FormInvalid { reason: String },

    /// A translated text field was resolved without a usable language.
    #[error("no usable language to resolve `{field}`")]
    LanguageMissing { field: String },

    /// A formula read a variable that has no stored value.
    #[error("value for `{name}` does not exist")]
    ValueMissing { name: String },

    /// A submitted value failed the element's constraint expression.
    #[error("constraint violated: {message}")]
    ConstraintViolated { message: String },

    /// A formula calls a function the evaluator does not implement.
    #[error("unsupported function: {name}")]
    UnsupportedFunction { name: String },

    /// Another commit on the same garbling block interleaved; retry.
    #[error("submission missed; please retry")]
    ConcurrencyConflict,

    /// The respondent already has a stored submission.
    #[error("already submitted")]
    Resubmission,

    /// Unclassified storage failure; the transaction was rolled back.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl SurveyError {
    pub fn form_invalid(reason: impl Into<String>) -> Self {
        SurveyError::FormInvalid {
            reason: reason.into(),
        }
    }

    /// Whether the error is fatal to form loading (as opposed to a
    /// per-request condition the host can surface and continue from).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SurveyError::FormInvalid { .. } | SurveyError::UnsupportedFunction { .. }
        )
    }
}

pub type SurveyResult<T> = Result<T, SurveyError>;
