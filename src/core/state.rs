//! # Task registry and run state store.
//!
//! [`Store`] keeps job payloads and their run states in two maps keyed by
//! [`JobKey`], plus the append-only display order used by snapshots.
//!
//! ## Rules
//! - A run state is created the first time a key becomes visible and is only
//!   dropped by an explicit [`Store::delete`] or [`Store::clear`].
//! - Display order is insertion order, never execution order.
//! - Payloads are replaced wholesale, never mutated.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::snapshot::RunView;

/// Stable job handle derived from a record by the identity function.
pub type JobKey = Arc<str>;

/// Position of a job in the run state machine.
///
/// ```text
/// idle ─► queued ─► running ─► succeeded
///                     │  ▲
///                     ▼  │
///                 retry_queued        running ─► failed
///
/// any ─► abandoned        idle | failed | abandoned | succeeded ─► queued (enqueue)
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RunStatus {
    /// Known, not scheduled.
    #[default]
    Idle,
    /// Waiting for a slot (primary queue or a forced single run).
    Queued,
    /// Handler in flight.
    Running,
    /// Failed with budget left; waiting to run again.
    RetryQueued,
    /// Last attempt succeeded.
    Succeeded,
    /// Retry budget exhausted.
    Failed,
    /// Withdrawn from scheduling.
    Abandoned,
}

impl RunStatus {
    /// Returns the snake_case label used in logs and UIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::RetryQueued => "retry_queued",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Abandoned => "abandoned",
        }
    }

    /// States from which `enqueue` is accepted.
    pub fn is_enqueueable(&self) -> bool {
        matches!(
            self,
            RunStatus::Idle | RunStatus::Failed | RunStatus::Abandoned | RunStatus::Succeeded
        )
    }

    /// Waiting to be dispatched.
    pub fn is_pending(&self) -> bool {
        matches!(self, RunStatus::Queued | RunStatus::RetryQueued)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduler-tracked metadata of one job.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RunState {
    /// Current status.
    pub status: RunStatus,
    /// Progress percentage (0..=100).
    pub progress: u8,
    /// Free-form phase label reported by the handler.
    pub stream_status: Option<String>,
    /// Failed attempts since the last success or reset.
    pub retry_count: u32,
    /// Last failure message.
    pub error: Option<String>,
}

impl RunState {
    /// Clears error/progress and marks the job `queued`.
    pub(crate) fn requeue(&mut self) {
        self.status = RunStatus::Queued;
        self.error = None;
        self.progress = 0;
    }
}

/// Run state plus engine bookkeeping that never leaves the crate.
#[derive(Debug, Default)]
pub(crate) struct Entry {
    pub state: RunState,
    /// Id of the most recent dispatch; completions and retry timers carrying another
    /// id are stale.
    pub run_id: Option<u64>,
}

impl Entry {
    /// True while the attempt `run_id` is the live one.
    pub fn is_current(&self, run_id: u64) -> bool {
        self.state.status == RunStatus::Running && self.run_id == Some(run_id)
    }
}

/// Registry of records, run states and display order.
pub(crate) struct Store<T> {
    records: HashMap<JobKey, T>,
    entries: HashMap<JobKey, Entry>,
    order: Vec<JobKey>,
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<T: Clone> Store<T> {
    /// Inserts or replaces a record and ensures its run state.
    ///
    /// Returns `true` when the key was not known before.
    pub fn upsert(&mut self, key: JobKey, record: T) -> bool {
        let fresh = self.ensure(&key);
        self.records.insert(key, record);
        fresh
    }

    /// Ensures a run state and display slot exist for `key`.
    ///
    /// Returns `true` when they were created.
    pub fn ensure(&mut self, key: &JobKey) -> bool {
        if self.entries.contains_key(key) {
            return false;
        }
        self.entries.insert(key.clone(), Entry::default());
        self.order.push(key.clone());
        true
    }

    pub fn has_record(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn record(&self, key: &str) -> Option<&T> {
        self.records.get(key)
    }

    pub fn entry(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn entry_mut(&mut self, key: &str) -> Option<&mut Entry> {
        self.entries.get_mut(key)
    }

    /// Returns the canonical key handle if the job is registered.
    pub fn key(&self, key: &str) -> Option<JobKey> {
        self.records.get_key_value(key).map(|(k, _)| k.clone())
    }

    /// Removes record, run state and display slot. Returns `true` if anything existed.
    pub fn delete(&mut self, key: &str) -> bool {
        let had_record = self.records.remove(key).is_some();
        let had_entry = self.entries.remove(key).is_some();
        if had_entry {
            self.order.retain(|k| &**k != key);
        }
        had_record || had_entry
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.entries.clear();
        self.order.clear();
    }

    /// Keys in display order.
    pub fn keys(&self) -> impl Iterator<Item = &JobKey> {
        self.order.iter()
    }

    /// Keys in display order whose status matches.
    pub fn keys_with(&self, status: RunStatus) -> Vec<JobKey> {
        self.order
            .iter()
            .filter(|k| self.entries.get(*k).is_some_and(|e| e.state.status == status))
            .cloned()
            .collect()
    }

    /// Joins record and run state for one key.
    pub fn view(&self, key: &str) -> Option<RunView<T>> {
        let (key, record) = self.records.get_key_value(key)?;
        let entry = self.entries.get(key)?;
        Some(RunView {
            key: key.clone(),
            record: record.clone(),
            state: entry.state.clone(),
        })
    }

    /// Joins every key in display order, skipping keys missing a record or state.
    pub fn views(&self) -> Vec<RunView<T>> {
        self.order.iter().filter_map(|k| self.view(k)).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> JobKey {
        Arc::from(s)
    }

    #[test]
    fn upsert_keeps_state_and_order() {
        let mut store = Store::default();
        assert!(store.upsert(key("b"), 1));
        assert!(store.upsert(key("a"), 2));

        store.entry_mut("b").unwrap().state.progress = 40;
        assert!(!store.upsert(key("b"), 3));

        let views = store.views();
        let keys: Vec<&str> = views.iter().map(|v| &*v.key).collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(views[0].record, 3);
        assert_eq!(views[0].state.progress, 40);
    }

    #[test]
    fn delete_removes_row() {
        let mut store = Store::default();
        store.upsert(key("a"), ());
        store.upsert(key("b"), ());

        assert!(store.delete("a"));
        assert!(!store.delete("a"));
        assert_eq!(store.len(), 1);
        assert!(store.view("a").is_none());
    }

    #[test]
    fn state_without_record_is_not_rendered() {
        let mut store: Store<u8> = Store::default();
        store.ensure(&key("ghost"));
        assert_eq!(store.len(), 1);
        assert!(store.views().is_empty());
    }

    #[test]
    fn status_helpers() {
        assert!(RunStatus::Succeeded.is_enqueueable());
        assert!(!RunStatus::Running.is_enqueueable());
        assert!(RunStatus::RetryQueued.is_pending());
        assert_eq!(RunStatus::RetryQueued.to_string(), "retry_queued");
    }
}
