//! # Timed backoff between retries.
//!
//! By default a failed job re-enters the retry queue immediately and is throttled
//! only by concurrency pressure (it must wait for a free slot). A [`BackoffPolicy`]
//! set on [`SchedulerConfig::retry_backoff`](crate::SchedulerConfig::retry_backoff)
//! adds a growing timer on top of that:
//!
//! ```text
//! delay(retry) = min(first × factor^(retry - 1), max), then jitter
//! ```
//!
//! `retry` is the job's retry count after the failure (1 for the first retry).
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use batchvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(500),
//!     max: Duration::from_secs(4),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.delay_for(1), Duration::from_millis(500));
//! assert_eq!(backoff.delay_for(3), Duration::from_secs(2));
//! assert_eq!(backoff.delay_for(9), Duration::from_secs(4));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Retry delay policy.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Upper bound for any delay (before jitter).
    pub max: Duration,
    /// Growth factor per retry (`1.0` = constant).
    pub factor: f64,
    /// Jitter applied to the capped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 1s`, `factor = 2.0`, `max = 60s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(60),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay before retry number `retry` (1-based).
    ///
    /// `retry = 0` is treated as `1`. Non-finite or negative intermediate values
    /// clamp to [`BackoffPolicy::max`].
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(first_ms: u64, max_ms: u64, factor: f64) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max: Duration::from_millis(max_ms),
            factor,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn first_retry_uses_first_delay() {
        let p = policy(100, 30_000, 2.0);
        assert_eq!(p.delay_for(0), Duration::from_millis(100));
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
    }

    #[test]
    fn grows_per_retry() {
        let p = policy(100, 30_000, 2.0);
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(400));
        assert_eq!(p.delay_for(4), Duration::from_millis(800));
    }

    #[test]
    fn constant_factor_stays_flat() {
        let p = policy(250, 30_000, 1.0);
        for retry in 1..8 {
            assert_eq!(p.delay_for(retry), Duration::from_millis(250));
        }
    }

    #[test]
    fn capped_at_max() {
        let p = policy(100, 1_000, 2.0);
        assert_eq!(p.delay_for(20), Duration::from_secs(1));
        assert_eq!(p.delay_for(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn first_above_max_is_clamped() {
        let p = policy(10_000, 5_000, 2.0);
        assert_eq!(p.delay_for(1), Duration::from_secs(5));
    }

    #[test]
    fn equal_jitter_stays_within_half_of_base() {
        let p = BackoffPolicy {
            jitter: JitterPolicy::Equal,
            ..policy(1_000, 30_000, 2.0)
        };
        for _ in 0..100 {
            let d = p.delay_for(2);
            assert!(d >= Duration::from_millis(1_000) && d <= Duration::from_millis(2_000));
        }
    }
}
