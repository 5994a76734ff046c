//! Retry timing policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] timed delay before a failed job re-enters scheduling
//! - [`JitterPolicy`]  randomization of that delay
//!
//! ## Defaults
//! - No timed backoff at all (`SchedulerConfig::retry_backoff = None`): retries
//!   are gated only by free execution slots.
//! - `BackoffPolicy::default()` → first=1s, factor=2.0, max=60s, jitter=None.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
