//! # batchvisor
//!
//! **Batchvisor** is an in-process, bounded-concurrency batch scheduler for Rust.
//!
//! It accepts a dynamic set of jobs, runs at most N of them concurrently, retries
//! failures, can pause and resume the whole batch, force one job to run right now,
//! and exposes a live snapshot of every job's status for a UI to render. It was
//! built to drive long-running content generation (AI-written articles) from a
//! dashboard, but the job payload is opaque.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   load_tasks / enqueue / start_all / run_one_now / remove_task ...
//!                                │
//!                                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Scheduler (control surface, one lock)                            │
//! │  - Store   (records, run states, display order)                   │
//! │  - Queues  (primary, retry, active gauge)                         │
//! │  - Awaiters (run_one_now completion signals)                      │
//! └──────┬─────────────────────────────▲─────────────────────┬────────┘
//!        │ drain: try_acquire slot     │ Completed / Requeue │ snapshot
//!        ▼                             │ / Dispatch commands ▼
//!  ┌────────────┐  ┌────────────┐      │              watch::Receiver<Runs<T>>
//!  │ run_once   │  │ run_once   │ ─────┘                 (UI, tests)
//!  │ (handler)  │  │ (handler)  │
//!  └─────┬──────┘  └─────┬──────┘
//!        │ publish       │ publish
//!        ▼               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Bus (broadcast channel)                       │
//! │              (capacity: SchedulerConfig::bus_capacity)            │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                         subscriber_listener
//!                                   ▼
//!                             SubscriberSet
//!                       ┌───────────┼───────────┐
//!                       ▼           ▼           ▼
//!                   LogWriter    metrics     custom
//! ```
//!
//! ### Lifecycle of one job
//! ```text
//! load_tasks ──► queued ──► drain (slot free, batch running)
//!                              │
//!                              ├─► running: handler.run(job, ctx)
//!                              │       ├─ Ok  ──► succeeded (retry_count = 0)
//!                              │       └─ Err ──► retry_count += 1
//!                              │                  ├─ ≤ max_retries ─► retry_queued
//!                              │                  │    batch:  back of retry queue
//!                              │                  │    single: own slot waiter
//!                              │                  └─ > max_retries ─► failed
//!                              └─► queues empty, nothing in flight ─► batch stops itself
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Scheduling**    | Load, queue, start/stop, single runs, retries.               | [`Scheduler`], [`Prune`], [`Removal`]       |
//! | **Snapshots**     | Live ordered list of run views.                              | [`RunView`], [`RunState`], [`RunStatus`]    |
//! | **Handlers**      | The one external call the engine makes.                      | [`Handler`], [`HandlerFn`], [`RunContext`]  |
//! | **Policies**      | Optional timed backoff between retries.                      | [`BackoffPolicy`], [`JitterPolicy`]         |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics).               | [`Subscribe`], [`Event`], [`EventKind`]     |
//! | **Errors**        | Typed errors for the control surface and handlers.           | [`SchedulerError`], [`TaskError`]           |
//! | **Configuration** | Centralized scheduler settings.                              | [`SchedulerConfig`]                         |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber (`tracing` records).
//! - `serde`: `Serialize` for [`RunView`], [`RunState`] and [`RunStatus`].
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use batchvisor::{
//!     HandlerFn, HandlerRef, Prune, RunContext, RunStatus, RunView, Scheduler,
//!     SchedulerConfig, TaskError,
//! };
//!
//! #[derive(Clone, Debug)]
//! struct Article { slug: String, keyword: String }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = SchedulerConfig::default();
//!     cfg.max_concurrency = 2;
//!     cfg.max_retries = 2;
//!
//!     // Build subscribers (optional)
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn batchvisor::Subscribe>> = vec![Arc::new(batchvisor::LogWriter)];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn batchvisor::Subscribe>> = Vec::new();
//!
//!     let write: HandlerRef<Article> = HandlerFn::arc(|job: RunView<Article>, ctx: RunContext| async move {
//!         ctx.set_stream_status(format!("drafting '{}'", job.record.keyword));
//!         tokio::time::sleep(Duration::from_millis(5)).await;
//!         ctx.set_progress(80);
//!         Ok::<(), TaskError>(())
//!     });
//!
//!     let scheduler = Scheduler::builder(cfg)
//!         .with_subscribers(subs)
//!         .build(|a: &Article| Arc::from(a.slug.as_str()), write);
//!
//!     let articles = ["espresso", "grinders", "kettles"].map(|k| Article {
//!         slug: format!("best-{k}"),
//!         keyword: k.to_string(),
//!     });
//!     scheduler.load_tasks(articles, Prune::None);
//!
//!     // Wait until the batch has stopped itself.
//!     let mut runs = scheduler.watch_runs();
//!     scheduler.start_all();
//!     runs.wait_for(|r| r.iter().all(|v| v.status() == RunStatus::Succeeded)).await?;
//!     assert!(!scheduler.is_running());
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod policies;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{
    JobKey, Prune, Removal, RunState, RunStatus, RunView, Runs, Scheduler, SchedulerBuilder,
    SchedulerConfig, SchedulerStats,
};
pub use error::{SchedulerError, TaskError};
pub use events::{Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{Handler, HandlerFn, HandlerRef, RunContext, RunMode};

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
