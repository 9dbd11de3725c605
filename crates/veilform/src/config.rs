//! Environment-backed deployment settings.

use std::env;
use std::time::Duration;
use veilform_common::{SurveyError, SurveyResult};
use veilform_eval::registry::DEFAULT_SESSION_LIFETIME;

/// Settings a deployment provides through the environment.
#[derive(Debug, Clone)]
pub struct SurveyConfig {
    /// Path of the parsed form tree (JSON).
    pub form_path: String,
    pub respondent_roster_path: String,
    pub enumerator_roster_path: String,
    /// Idle lifetime before a survey session is evicted.
    pub session_lifetime: Duration,
}

impl SurveyConfig {
    /// Read configuration from the environment. Required variables:
    /// `SURVEY_FORM_PATH`, `RESPONDENT_ROSTER_PATH`,
    /// `ENUMERATOR_ROSTER_PATH`. Optional: `SESSION_LIFETIME_SECS`
    /// (default twelve hours).
    pub fn from_env() -> SurveyResult<Self> {
        let session_lifetime = match env::var("SESSION_LIFETIME_SECS") {
            Ok(value) => {
                let secs: u64 = value.parse().map_err(|_| {
                    SurveyError::PersistenceFailure(format!(
                        "SESSION_LIFETIME_SECS is not a number: {value}"
                    ))
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => DEFAULT_SESSION_LIFETIME,
        };
        Ok(SurveyConfig {
            form_path: require_env("SURVEY_FORM_PATH")?,
            respondent_roster_path: require_env("RESPONDENT_ROSTER_PATH")?,
            enumerator_roster_path: require_env("ENUMERATOR_ROSTER_PATH")?,
            session_lifetime,
        })
    }
}

fn require_env(name: &str) -> SurveyResult<String> {
    env::var(name)
        .map_err(|_| SurveyError::PersistenceFailure(format!("missing environment variable: {name}")))
}
