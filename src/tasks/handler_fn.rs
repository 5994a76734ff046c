//! # Function-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a closure `F: Fn(RunView<T>, RunContext) -> Fut`, producing a
//! fresh future per attempt. Shared state between attempts must be explicit
//! (`Arc<...>` captured by the closure).
//!
//! ## Example
//! ```rust
//! use batchvisor::{HandlerFn, HandlerRef, RunContext, RunView, TaskError};
//!
//! let h: HandlerRef<String> = HandlerFn::arc(|job: RunView<String>, ctx: RunContext| async move {
//!     ctx.set_stream_status(format!("writing {}", job.record));
//!     Ok::<_, TaskError>(())
//! });
//! # let _ = h;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::RunView;
use crate::error::TaskError;
use crate::tasks::{Handler, RunContext};

/// Function-backed handler implementation.
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a [`HandlerRef`](crate::HandlerRef).
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<T, F, Fut> Handler<T> for HandlerFn<F>
where
    T: Send + 'static,
    F: Fn(RunView<T>, RunContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    async fn run(&self, job: RunView<T>, ctx: RunContext) -> Result<(), TaskError> {
        (self.f)(job, ctx).await
    }
}
