//! # Queue manager.
//!
//! Two FIFO queues of job keys plus the in-flight gauge:
//!
//! ```text
//! primary: [k1, k2, k3] ─┐
//!                        ├─► take_next()  (primary first, then retry)
//! retry:   [k7, k9]    ──┘
//! ```
//!
//! Preferring primary keeps freshly loaded work from starving behind a backlog of
//! retries; retries still run as soon as primary drains.

use std::collections::VecDeque;

use super::state::JobKey;

/// Which queue a key was taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Lane {
    Primary,
    Retry,
}

#[derive(Debug, Default)]
pub(crate) struct Queues {
    primary: VecDeque<JobKey>,
    retry: VecDeque<JobKey>,
    /// Handler invocations currently in flight (batch and single).
    pub active: usize,
}

impl Queues {
    pub fn push_primary(&mut self, key: JobKey) {
        self.primary.push_back(key);
    }

    pub fn push_retry(&mut self, key: JobKey) {
        self.retry.push_back(key);
    }

    /// Pops the next key, primary before retry.
    pub fn take_next(&mut self) -> Option<(JobKey, Lane)> {
        if let Some(key) = self.primary.pop_front() {
            return Some((key, Lane::Primary));
        }
        self.retry.pop_front().map(|key| (key, Lane::Retry))
    }

    /// Drops every occurrence of `key` from both queues. Returns `true` if any was found.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.primary.len() + self.retry.len();
        self.primary.retain(|k| &**k != key);
        self.retry.retain(|k| &**k != key);
        before != self.primary.len() + self.retry.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.primary.iter().chain(self.retry.iter()).any(|k| &**k == key)
    }

    /// No key waiting in either queue.
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.retry.is_empty()
    }

    pub fn primary_len(&self) -> usize {
        self.primary.len()
    }

    pub fn retry_len(&self) -> usize {
        self.retry.len()
    }

    /// Empties both queues. The in-flight gauge is left alone: running handlers
    /// still hold their slots until they finish.
    pub fn clear(&mut self) {
        self.primary.clear();
        self.retry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn primary_is_preferred() {
        let mut q = Queues::default();
        q.push_retry(Arc::from("r1"));
        q.push_primary(Arc::from("p1"));
        q.push_retry(Arc::from("r2"));
        q.push_primary(Arc::from("p2"));

        let order: Vec<_> = std::iter::from_fn(|| q.take_next())
            .map(|(k, lane)| (k.to_string(), lane))
            .collect();
        assert_eq!(
            order,
            vec![
                ("p1".to_string(), Lane::Primary),
                ("p2".to_string(), Lane::Primary),
                ("r1".to_string(), Lane::Retry),
                ("r2".to_string(), Lane::Retry),
            ]
        );
    }

    #[test]
    fn remove_hits_both_queues_and_duplicates() {
        let mut q = Queues::default();
        q.push_primary(Arc::from("a"));
        q.push_primary(Arc::from("a"));
        q.push_retry(Arc::from("a"));
        q.push_retry(Arc::from("b"));

        assert!(q.remove("a"));
        assert!(!q.contains("a"));
        assert!(q.contains("b"));
        assert!(!q.remove("a"));
    }
}
