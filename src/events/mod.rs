//! Scheduler events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Scheduler` control surface, the coordinator loop,
//!   `runner::run_once`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the subscriber listener spawned by `SchedulerBuilder::build`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
