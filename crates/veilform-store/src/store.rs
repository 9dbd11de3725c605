//! The persistence adapter.
//!
//! [`SurveyStore`] exposes point lookups, transactional staging, and the
//! survey lifecycle. Writes go through a [`StoreTransaction`]: stage block
//! upserts, submission inserts, and respondent-status updates, then commit
//! once; dropping a transaction without committing rolls everything back.
//!
//! Block writes use optimistic concurrency: a staged block carries the
//! version it was read at, and commit applies it only while the stored
//! version still matches, incrementing it by one. A mismatch fails the whole
//! transaction with `ConcurrencyConflict`, so commits on the same block are
//! totally ordered by successful version increments.

use crate::model::{
    BlockRow, EnumeratorRow, RespondentRow, RespondentStatus, SubmissionRow, SurveyPhase,
};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use veilform_common::{SurveyError, SurveyResult, generate_uuid};

pub trait SurveyStore {
    fn respondent(&self, uuid: &str) -> SurveyResult<Option<RespondentRow>>;
    fn respondents(&self) -> SurveyResult<Vec<RespondentRow>>;
    fn enumerator(&self, uuid: &str) -> SurveyResult<Option<EnumeratorRow>>;
    fn enumerators(&self) -> SurveyResult<Vec<EnumeratorRow>>;
    fn block(&self, name: &str) -> SurveyResult<Option<BlockRow>>;
    fn submissions(&self) -> SurveyResult<Vec<SubmissionRow>>;
    fn submission_for(&self, respondent_uuid: &str) -> SurveyResult<Option<SubmissionRow>>;

    /// Bulk-insert roster rows; `uuid` attributes are honored, absent ones
    /// synthesized.
    fn add_respondents(&self, rows: Vec<BTreeMap<String, String>>) -> SurveyResult<usize>;
    fn add_enumerators(&self, rows: Vec<BTreeMap<String, String>>) -> SurveyResult<usize>;

    fn phase(&self) -> SurveyResult<SurveyPhase>;
    fn set_phase(&self, phase: SurveyPhase) -> SurveyResult<()>;

    fn begin(&self) -> Box<dyn StoreTransaction + '_>;

    /* Lifecycle commands (administrative contract) */

    fn activate(&self) -> SurveyResult<()> {
        self.set_phase(SurveyPhase::Active)
    }

    fn pause(&self) -> SurveyResult<()> {
        self.set_phase(SurveyPhase::Paused)
    }

    /// End the survey; the implementation must drop all garbling blocks.
    fn end(&self) -> SurveyResult<()> {
        self.set_phase(SurveyPhase::Ended)
    }
}

pub trait StoreTransaction {
    /// Stage a block upsert. `row.version` must be the version the block was
    /// read at (0 for a block that did not exist yet).
    fn stage_block(&mut self, row: BlockRow);

    /// Stage a submission insert; uniqueness on `respondent_uuid` is checked
    /// at commit.
    fn stage_submission(&mut self, row: SubmissionRow);

    /// Stage a respondent completion-status update.
    fn stage_respondent_status(&mut self, respondent_uuid: &str, status: RespondentStatus);

    /// Validate every staged write, then apply all of them atomically.
    fn commit(self: Box<Self>) -> SurveyResult<()>;
}

/* ───────────────────── in-memory implementation ───────────────────── */

#[derive(Default)]
struct Inner {
    respondents: Vec<RespondentRow>,
    respondent_index: FxHashMap<String, usize>,
    enumerators: Vec<EnumeratorRow>,
    enumerator_index: FxHashMap<String, usize>,
    blocks: FxHashMap<String, BlockRow>,
    submissions: Vec<SubmissionRow>,
    phase: Option<SurveyPhase>,
    next_row_id: u64,
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.next_row_id += 1;
        self.next_row_id
    }
}

/// Process-local [`SurveyStore`] backed by a read/write lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl SurveyStore for MemoryStore {
    fn respondent(&self, uuid: &str) -> SurveyResult<Option<RespondentRow>> {
        let inner = self.inner.read();
        Ok(inner
            .respondent_index
            .get(uuid)
            .map(|&i| inner.respondents[i].clone()))
    }

    fn respondents(&self) -> SurveyResult<Vec<RespondentRow>> {
        Ok(self.inner.read().respondents.clone())
    }

    fn enumerator(&self, uuid: &str) -> SurveyResult<Option<EnumeratorRow>> {
        let inner = self.inner.read();
        Ok(inner
            .enumerator_index
            .get(uuid)
            .map(|&i| inner.enumerators[i].clone()))
    }

    fn enumerators(&self) -> SurveyResult<Vec<EnumeratorRow>> {
        Ok(self.inner.read().enumerators.clone())
    }

    fn block(&self, name: &str) -> SurveyResult<Option<BlockRow>> {
        Ok(self.inner.read().blocks.get(name).cloned())
    }

    fn submissions(&self) -> SurveyResult<Vec<SubmissionRow>> {
        Ok(self.inner.read().submissions.clone())
    }

    fn submission_for(&self, respondent_uuid: &str) -> SurveyResult<Option<SubmissionRow>> {
        Ok(self
            .inner
            .read()
            .submissions
            .iter()
            .find(|s| s.respondent_uuid == respondent_uuid)
            .cloned())
    }

    fn add_respondents(&self, rows: Vec<BTreeMap<String, String>>) -> SurveyResult<usize> {
        let mut inner = self.inner.write();
        // Import is all-or-nothing: validate and build every row before the
        // first insert, so a bad row leaves no earlier rows behind
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut prepared = Vec::with_capacity(rows.len());
        for mut attributes in rows {
            let uuid = attributes
                .remove("uuid")
                .filter(|u| !u.is_empty())
                .unwrap_or_else(generate_uuid);
            let enumerator_uuid = attributes.remove("enumerator_uuid").filter(|u| !u.is_empty());
            if inner.respondent_index.contains_key(&uuid) || !seen.insert(uuid.clone()) {
                return Err(SurveyError::PersistenceFailure(format!(
                    "duplicate respondent uuid: {uuid}"
                )));
            }
            prepared.push((uuid, enumerator_uuid, attributes));
        }

        let count = prepared.len();
        for (uuid, enumerator_uuid, attributes) in prepared {
            let id = inner.next_id();
            let index = inner.respondents.len();
            inner.respondents.push(RespondentRow {
                id,
                uuid: uuid.clone(),
                status: RespondentStatus::Incomplete,
                enumerator_uuid,
                attributes,
            });
            inner.respondent_index.insert(uuid, index);
        }
        debug!(count, "respondents added");
        Ok(count)
    }

    fn add_enumerators(&self, rows: Vec<BTreeMap<String, String>>) -> SurveyResult<usize> {
        let mut inner = self.inner.write();
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut prepared = Vec::with_capacity(rows.len());
        for mut attributes in rows {
            let uuid = attributes
                .remove("uuid")
                .filter(|u| !u.is_empty())
                .unwrap_or_else(generate_uuid);
            if inner.enumerator_index.contains_key(&uuid) || !seen.insert(uuid.clone()) {
                return Err(SurveyError::PersistenceFailure(format!(
                    "duplicate enumerator uuid: {uuid}"
                )));
            }
            prepared.push((uuid, attributes));
        }

        let count = prepared.len();
        for (uuid, attributes) in prepared {
            let id = inner.next_id();
            let index = inner.enumerators.len();
            inner.enumerators.push(EnumeratorRow {
                id,
                uuid: uuid.clone(),
                attributes,
            });
            inner.enumerator_index.insert(uuid, index);
        }
        debug!(count, "enumerators added");
        Ok(count)
    }

    fn phase(&self) -> SurveyResult<SurveyPhase> {
        Ok(self.inner.read().phase.unwrap_or(SurveyPhase::Paused))
    }

    fn set_phase(&self, phase: SurveyPhase) -> SurveyResult<()> {
        let mut inner = self.inner.write();
        inner.phase = Some(phase);
        if phase == SurveyPhase::Ended {
            let dropped = inner.blocks.len();
            inner.blocks.clear();
            info!(dropped, "survey ended; garbling blocks dropped");
        }
        Ok(())
    }

    fn begin(&self) -> Box<dyn StoreTransaction + '_> {
        Box::new(MemoryTransaction {
            store: self,
            staged_blocks: Vec::new(),
            staged_submissions: Vec::new(),
            staged_statuses: Vec::new(),
        })
    }
}

struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    staged_blocks: Vec<BlockRow>,
    staged_submissions: Vec<SubmissionRow>,
    staged_statuses: Vec<(String, RespondentStatus)>,
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn stage_block(&mut self, row: BlockRow) {
        self.staged_blocks.push(row);
    }

    fn stage_submission(&mut self, row: SubmissionRow) {
        self.staged_submissions.push(row);
    }

    fn stage_respondent_status(&mut self, respondent_uuid: &str, status: RespondentStatus) {
        self.staged_statuses.push((respondent_uuid.to_owned(), status));
    }

    fn commit(self: Box<Self>) -> SurveyResult<()> {
        let mut inner = self.store.inner.write();

        // Validate everything before touching state: a failed commit leaves
        // no durable effect
        for staged in &self.staged_blocks {
            let stored_version = inner.blocks.get(&staged.name).map(|b| b.version).unwrap_or(0);
            if stored_version != staged.version {
                warn!(
                    block = %staged.name,
                    read_version = staged.version,
                    stored_version,
                    "optimistic lock conflict"
                );
                return Err(SurveyError::ConcurrencyConflict);
            }
        }
        for staged in &self.staged_submissions {
            if inner
                .submissions
                .iter()
                .any(|s| s.respondent_uuid == staged.respondent_uuid)
            {
                return Err(SurveyError::Resubmission);
            }
        }
        for (uuid, _) in &self.staged_statuses {
            if !inner.respondent_index.contains_key(uuid) {
                return Err(SurveyError::PersistenceFailure(format!(
                    "unknown respondent: {uuid}"
                )));
            }
        }

        for mut staged in self.staged_blocks {
            staged.version += 1;
            if staged.id == 0 {
                staged.id = inner.next_id();
            }
            debug!(block = %staged.name, version = staged.version, "block committed");
            inner.blocks.insert(staged.name.clone(), staged);
        }
        for mut staged in self.staged_submissions {
            staged.id = inner.next_id();
            debug!(respondent = %staged.respondent_uuid, "submission stored");
            inner.submissions.push(staged);
        }
        for (uuid, status) in self.staged_statuses {
            if let Some(&index) = inner.respondent_index.get(&uuid) {
                inner.respondents[index].status = status;
            }
        }
        Ok(())
    }
}
