//! # LogWriter: events as `tracing` records
//!
//! Writes every incoming [`Event`] as a structured `tracing` record under the
//! `batchvisor` target. The application decides where records go by installing a
//! subscriber (e.g. `tracing_subscriber::fmt()`).
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO batchvisor: queued task="post-1"
//! INFO batchvisor: starting task="post-1" attempt=1 mode="batch"
//! WARN batchvisor: attempt failed task="post-1" attempt=1 error="429 Too Many Requests"
//! INFO batchvisor: retry scheduled task="post-1" after_attempt=1 delay_ms=Some(1000)
//! INFO batchvisor: succeeded task="post-1" attempt=2
//! INFO batchvisor: batch drained
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "batchvisor";

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::TaskLoaded => debug!(target: TARGET, task, seq = e.seq, "loaded"),
            EventKind::TaskQueued => info!(target: TARGET, task, "queued"),
            EventKind::TaskDequeued => info!(target: TARGET, task, "dequeued"),
            EventKind::TaskStarting => {
                info!(target: TARGET, task, attempt = ?e.attempt, mode = reason, "starting")
            }
            EventKind::TaskSucceeded => {
                info!(target: TARGET, task, attempt = ?e.attempt, "succeeded")
            }
            EventKind::TaskFailed => {
                warn!(target: TARGET, task, attempt = ?e.attempt, error = reason, "attempt failed")
            }
            EventKind::TimeoutHit => {
                warn!(target: TARGET, task, attempt = ?e.attempt, timeout_ms = ?e.timeout_ms, "timeout")
            }
            EventKind::RetryScheduled => info!(
                target: TARGET,
                task,
                after_attempt = ?e.attempt,
                delay_ms = ?e.delay_ms,
                "retry scheduled"
            ),
            EventKind::TaskExhausted => {
                error!(target: TARGET, task, attempt = ?e.attempt, error = reason, "retries exhausted")
            }
            EventKind::TaskAbandoned => info!(target: TARGET, task, reason, "abandoned"),
            EventKind::TaskRemoved => info!(target: TARGET, task, "removed"),
            EventKind::BatchStarted => info!(target: TARGET, "batch started"),
            EventKind::BatchStopped => info!(target: TARGET, "batch stopped"),
            EventKind::BatchDrained => info!(target: TARGET, "batch drained"),
            EventKind::SubscriberOverflow => {
                warn!(target: TARGET, subscriber = task, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                error!(target: TARGET, subscriber = task, info = reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
