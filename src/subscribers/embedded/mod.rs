//! # Built-in subscribers
//!
//! - [`LogWriter`]: writes events as structured `tracing` records.

mod log;

pub use log::LogWriter;
