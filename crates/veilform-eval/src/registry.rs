//! Per-respondent session ownership.
//!
//! Sessions are pinned by respondent key; no two requests for the same key
//! are expected in parallel, so the registry hands out exclusive access per
//! call. A host scheduler can sweep idle entries with [`SessionRegistry::evict_idle`];
//! callers transparently get a fresh session afterwards.

use crate::session::SurveySession;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::info;

/// Default idle lifetime before a session is evicted.
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SessionEntry>,
}

struct SessionEntry {
    session: SurveySession,
    last_touched: Instant,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry::default()
    }

    /// Run `f` against the respondent's session, creating a fresh one when
    /// absent, since a session may have been evicted between requests.
    pub fn with_session<R>(
        &self,
        respondent_key: &str,
        f: impl FnOnce(&mut SurveySession) -> R,
    ) -> R {
        let mut entry = self
            .sessions
            .entry(respondent_key.to_owned())
            .or_insert_with(|| SessionEntry {
                session: SurveySession::new(),
                last_touched: Instant::now(),
            });
        entry.last_touched = Instant::now();
        f(&mut entry.session)
    }

    pub fn remove(&self, respondent_key: &str) {
        self.sessions.remove(respondent_key);
    }

    /// Drop sessions idle for longer than `max_age`; returns the count
    /// evicted.
    pub fn evict_idle(&self, max_age: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| entry.last_touched.elapsed() < max_age);
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            info!(evicted, "idle survey sessions evicted");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
