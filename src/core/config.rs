//! # Scheduler configuration.
//!
//! Provides [`SchedulerConfig`], the centralized settings of one scheduler
//! instance. Values are fixed at build time; the concurrency ceiling in
//! particular cannot change while the scheduler runs.
//!
//! ## Sentinel values
//! - `max_concurrency = 0` → treated as `1`
//! - `delay = 0s` → no pause between batch completions
//! - `timeout = 0s` → attempts may run indefinitely

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Configuration for a [`Scheduler`](crate::Scheduler).
///
/// ## Field semantics
/// - `max_concurrency`: ceiling on in-flight handler invocations (batch and single runs combined)
/// - `max_retries`: retries allowed after the first attempt before a job is `failed`
/// - `delay`: pause after each batch-mode success before the freed slot is refilled
/// - `timeout`: per-attempt timeout (`0s` = none)
/// - `retry_backoff`: optional timed delay before a failed job re-enters scheduling
/// - `bus_capacity`: event bus ring buffer size (min 1)
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Maximum number of handler invocations in flight.
    pub max_concurrency: usize,

    /// Retry budget per job.
    ///
    /// A job that fails `max_retries + 1` times in a row ends `failed`.
    pub max_retries: u32,

    /// Inter-job delay applied after a batch-mode success.
    ///
    /// Rate-limits the downstream provider; single runs are not delayed.
    pub delay: Duration,

    /// Per-attempt timeout.
    ///
    /// An attempt exceeding it counts as a failure. The handler future is dropped.
    pub timeout: Duration,

    /// Timed backoff before retries.
    ///
    /// `None` (default) → retries wait only for a free execution slot.
    pub retry_backoff: Option<BackoffPolicy>,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
}

impl SchedulerConfig {
    /// Returns the concurrency ceiling, at least 1.
    #[inline]
    pub fn concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }

    /// Returns the inter-job delay as an `Option` (`None` when zero).
    #[inline]
    pub fn inter_job_delay(&self) -> Option<Duration> {
        (self.delay > Duration::ZERO).then_some(self.delay)
    }

    /// Returns the per-attempt timeout as an `Option` (`None` when zero).
    #[inline]
    pub fn attempt_timeout(&self) -> Option<Duration> {
        (self.timeout > Duration::ZERO).then_some(self.timeout)
    }

    /// Returns the timed delay before retry number `retry`, if a backoff is configured.
    #[inline]
    pub fn retry_delay(&self, retry: u32) -> Option<Duration> {
        self.retry_backoff
            .map(|b| b.delay_for(retry))
            .filter(|d| *d > Duration::ZERO)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SchedulerConfig {
    /// Default configuration:
    ///
    /// - `max_concurrency = 1`
    /// - `max_retries = 3`
    /// - `delay = 0s`, `timeout = 0s`
    /// - `retry_backoff = None`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            max_retries: 3,
            delay: Duration::ZERO,
            timeout: Duration::ZERO,
            retry_backoff: None,
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        let cfg = SchedulerConfig {
            max_concurrency: 0,
            bus_capacity: 0,
            ..SchedulerConfig::default()
        };
        assert_eq!(cfg.concurrency(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.inter_job_delay(), None);
        assert_eq!(cfg.attempt_timeout(), None);
        assert_eq!(cfg.retry_delay(1), None);
    }

    #[test]
    fn retry_delay_follows_backoff() {
        let cfg = SchedulerConfig {
            retry_backoff: Some(BackoffPolicy {
                first: Duration::from_millis(100),
                factor: 3.0,
                ..BackoffPolicy::default()
            }),
            ..SchedulerConfig::default()
        };
        assert_eq!(cfg.retry_delay(2), Some(Duration::from_millis(300)));
    }
}
