//! # Per-job completion signals.
//!
//! Callers of `run_one_now` await one specific job's terminal outcome even though
//! the engine runs it like any other dispatch. Each waiter is a oneshot sender
//! stored under the job key; a key's senders are fulfilled together exactly once
//! and removed.

use std::collections::HashMap;

use tokio::sync::oneshot;

use super::state::JobKey;
use crate::error::SchedulerError;

pub(crate) type Outcome = Result<(), SchedulerError>;

#[derive(Default)]
pub(crate) struct Awaiters {
    waiting: HashMap<JobKey, Vec<oneshot::Sender<Outcome>>>,
}

impl Awaiters {
    /// Registers a waiter for `key`.
    pub fn register(&mut self, key: JobKey) -> oneshot::Receiver<Outcome> {
        let (tx, rx) = oneshot::channel();
        self.waiting.entry(key).or_default().push(tx);
        rx
    }

    /// Fulfills and removes every waiter of `key`.
    pub fn resolve(&mut self, key: &str, outcome: Outcome) {
        let Some(senders) = self.waiting.remove(key) else {
            return;
        };
        for tx in senders {
            // A caller that stopped waiting dropped its receiver.
            let _ = tx.send(outcome.clone());
        }
    }

    /// Fulfills every waiter of every key with an outcome built from the key.
    pub fn resolve_all(&mut self, outcome: impl Fn(&str) -> Outcome) {
        for (key, senders) in self.waiting.drain() {
            for tx in senders {
                let _ = tx.send(outcome(&key));
            }
        }
    }

    pub fn is_waiting(&self, key: &str) -> bool {
        self.waiting.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn all_waiters_of_a_key_are_fulfilled_once() {
        let mut aw = Awaiters::default();
        let a1 = aw.register(Arc::from("a"));
        let a2 = aw.register(Arc::from("a"));
        let b = aw.register(Arc::from("b"));

        aw.resolve(
            "a",
            Err(SchedulerError::Failed {
                id: "a".into(),
                error: "boom".into(),
            }),
        );
        assert!(!aw.is_waiting("a"));
        assert!(aw.is_waiting("b"));

        for rx in [a1, a2] {
            let out = rx.await.expect("sent");
            assert!(matches!(out, Err(SchedulerError::Failed { .. })));
        }

        aw.resolve_all(|_| Err(SchedulerError::Closed));
        assert_eq!(b.await.expect("sent"), Err(SchedulerError::Closed));
    }

    #[test]
    fn resolving_unknown_key_is_noop() {
        let mut aw = Awaiters::default();
        aw.resolve("nobody", Ok(()));
        assert!(!aw.is_waiting("nobody"));
    }
}
