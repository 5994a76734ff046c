//! # Job handler abstraction.
//!
//! The scheduler knows nothing about what a job *does*: it hands each dispatched
//! job to a [`Handler`] together with a [`RunContext`] and interprets only the
//! returned `Result`.
//!
//! - `Ok(())` - the attempt succeeded; the job becomes `succeeded`.
//! - `Err(_)` - the attempt failed; the retry policy decides what happens next.
//!
//! # Example
//! ```
//! use async_trait::async_trait;
//! use batchvisor::{Handler, RunContext, RunView, TaskError};
//!
//! #[derive(Clone)]
//! struct Article { slug: String, keyword: String }
//!
//! struct Writer;
//!
//! #[async_trait]
//! impl Handler<Article> for Writer {
//!     async fn run(&self, job: RunView<Article>, ctx: RunContext) -> Result<(), TaskError> {
//!         ctx.set_stream_status(format!("drafting '{}'", job.record.keyword));
//!         ctx.set_progress(50);
//!         // call the provider, store the draft...
//!         Ok(())
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::RunView;
use crate::error::TaskError;
use crate::tasks::RunContext;

/// Executes one attempt of one job.
///
/// Implementations may be slow; they run on their own tokio task and never block
/// the scheduler. Attempts of the same job are strictly sequential.
#[async_trait]
pub trait Handler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    /// Runs the job once.
    ///
    /// `job` is a snapshot taken at dispatch time; live updates go through `ctx`.
    async fn run(&self, job: RunView<T>, ctx: RunContext) -> Result<(), TaskError>;
}

/// Shared handle to a handler.
pub type HandlerRef<T> = Arc<dyn Handler<T>>;
