//! # Event subscribers for the scheduler.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out,
//! and (with the `logging` feature) the built-in [`LogWriter`].
//!
//! ```text
//! Coordinator ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!                                                          │
//!                                               ┌──────────┼──────────┐
//!                                               ▼          ▼          ▼
//!                                           LogWriter   Metrics    Custom
//! ```
//!
//! Subscribers observe history; the live per-job table is the run snapshot
//! (`Scheduler::watch_runs`).

#[cfg(feature = "logging")]
mod embedded;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
