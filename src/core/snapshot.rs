//! # Run views and the snapshot emitter.
//!
//! A [`RunView`] joins one job's record with its run state. After every mutation
//! the scheduler recomputes the ordered list of views and publishes it on a
//! `tokio::sync::watch` channel: observers always see the latest complete table
//! and never the queues or counters behind it.

use std::sync::Arc;

use tokio::sync::watch;

use super::state::{JobKey, RunState, RunStatus};

/// Read-only join of a job's payload and its run state.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RunView<T> {
    /// Job key.
    pub key: JobKey,
    /// Payload as last loaded.
    pub record: T,
    /// Run state at snapshot time.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub state: RunState,
}

impl<T> RunView<T> {
    /// Shorthand for `self.state.status`.
    #[inline]
    pub fn status(&self) -> RunStatus {
        self.state.status
    }
}

/// Ordered list of run views, shared between observers.
pub type Runs<T> = Arc<[RunView<T>]>;

/// Publishes snapshots to any number of observers.
pub(crate) struct Emitter<T> {
    tx: watch::Sender<Runs<T>>,
}

impl<T> Emitter<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Runs::<T>::from(Vec::new()));
        Self { tx }
    }

    /// Replaces the current snapshot and wakes observers.
    pub fn publish(&self, views: Vec<RunView<T>>) {
        self.tx.send_replace(Runs::from(views));
    }

    pub fn current(&self) -> Runs<T> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Runs<T>> {
        self.tx.subscribe()
    }
}
