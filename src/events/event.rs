//! # Lifecycle events emitted by the scheduler.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Job events**: one job moving through its run state machine
//! - **Batch events**: the global running flag changing
//! - **Subscriber events**: delivery problems inside the fan-out
//!
//! The [`Event`] struct carries metadata such as timestamps, job key,
//! reasons, attempt counters and delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use batchvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RetryScheduled)
//!     .with_task("post-42")
//!     .with_reason("rate limited")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(1));
//!
//! assert_eq!(ev.kind, EventKind::RetryScheduled);
//! assert_eq!(ev.task.as_deref(), Some("post-42"));
//! assert_eq!(ev.delay_ms, Some(1000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of scheduler events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Job events ===
    /// Job record inserted or replaced in the registry.
    ///
    /// Sets: `task`
    TaskLoaded,

    /// Job pushed to the primary queue.
    ///
    /// Sets: `task`
    TaskQueued,

    /// Job pulled out of a queue without running.
    ///
    /// Sets: `task`
    TaskDequeued,

    /// Handler invocation starting.
    ///
    /// Sets:
    /// - `task`: job key
    /// - `attempt`: 1-based attempt number (`retry_count + 1`)
    /// - `reason`: `"batch"` or `"single"`
    TaskStarting,

    /// Attempt succeeded; job is `succeeded`.
    ///
    /// Sets: `task`, `attempt`
    TaskSucceeded,

    /// Attempt failed.
    ///
    /// Sets: `task`, `attempt`, `reason` (failure message)
    TaskFailed,

    /// Attempt exceeded the per-attempt timeout (always followed by `TaskFailed`).
    ///
    /// Sets: `task`, `attempt`, `timeout_ms`
    TimeoutHit,

    /// Job will be retried.
    ///
    /// Sets: `task`, `attempt` (failed attempt), `reason`, `delay_ms` (only with
    /// a timed backoff)
    RetryScheduled,

    /// Retry budget exhausted; job is `failed`.
    ///
    /// Sets: `task`, `attempt`, `reason`
    TaskExhausted,

    /// Job withdrawn from scheduling (explicit abandon, prune, or record vanished).
    ///
    /// Sets: `task`, `reason`
    TaskAbandoned,

    /// Job row and state deleted.
    ///
    /// Sets: `task`
    TaskRemoved,

    // === Batch events ===
    /// Global running flag set.
    BatchStarted,

    /// Global running flag cleared by `stop_all` or a reset.
    BatchStopped,

    /// Global running flag cleared because nothing is queued or in flight.
    BatchDrained,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `task` (subscriber name), `reason` (panic info)
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `task` (subscriber name), `reason`
    SubscriberOverflow,
}

/// Scheduler event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Job key (or subscriber name for subscriber events).
    pub task: Option<Arc<str>>,
    /// Human-readable reason (errors, run mode, overflow details).
    pub reason: Option<Arc<str>>,
    /// Attempt number (starting from 1).
    pub attempt: Option<u32>,
    /// Attempt timeout in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Retry delay in milliseconds.
    pub delay_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            reason: None,
            attempt: None,
            timeout_ms: None,
            delay_ms: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a job key.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches an attempt number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a retry delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::BatchStarted);
        let b = Event::new(EventKind::BatchStopped);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn huge_delay_saturates() {
        let ev = Event::new(EventKind::RetryScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
