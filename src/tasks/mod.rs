//! # Job handler abstractions.
//!
//! - [`Handler`] - trait executing one attempt of one job
//! - [`HandlerFn`] - closure-backed handler
//! - [`HandlerRef`] - shared handle (`Arc<dyn Handler<T>>`)
//! - [`RunContext`] - progress/annotation helpers passed to every attempt

mod context;
mod handler;
mod handler_fn;

pub(crate) use context::ProgressSink;
pub use context::{RunContext, RunMode};
pub use handler::{Handler, HandlerRef};
pub use handler_fn::HandlerFn;
