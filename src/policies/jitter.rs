//! # Jitter applied to retry delays.
//!
//! [`JitterPolicy`] spreads retries of jobs that failed together (typically a
//! provider rate limit hitting the whole batch) so they do not re-enter the queue
//! in lockstep.
//!
//! - [`JitterPolicy::None`] - exact delay
//! - [`JitterPolicy::Full`] - random delay in `[0, delay]`
//! - [`JitterPolicy::Equal`] - `delay/2 + random[0, delay/2]`

use rand::Rng;
use std::time::Duration;

/// Randomization strategy for retry delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// No jitter: use exact backoff delay.
    #[default]
    None,

    /// Full jitter: random delay in `[0, delay]`.
    ///
    /// Most aggressive spreading; the average delay halves.
    Full,

    /// Equal jitter: `delay/2 + random[0, delay/2]`.
    ///
    /// Keeps at least half of the computed delay.
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(rand::rng().random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                let extra = if half == 0 {
                    0
                } else {
                    rand::rng().random_range(0..=half)
                };
                Duration::from_millis(half + extra)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let d = Duration::from_millis(1234);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn zero_stays_zero() {
        for policy in [JitterPolicy::None, JitterPolicy::Full, JitterPolicy::Equal] {
            assert_eq!(policy.apply(Duration::ZERO), Duration::ZERO);
        }
    }

    #[test]
    fn equal_keeps_lower_half() {
        let d = Duration::from_millis(1000);
        for _ in 0..200 {
            let j = JitterPolicy::Equal.apply(d);
            assert!(j >= Duration::from_millis(500), "{j:?} below half");
            assert!(j <= d, "{j:?} above delay");
        }
    }

    #[test]
    fn full_never_exceeds_delay() {
        let d = Duration::from_millis(300);
        for _ in 0..200 {
            assert!(JitterPolicy::Full.apply(d) <= d);
        }
    }
}
