//! Runtime core: job registry, queues, execution engine and control surface.
//!
//! The only public entry point is [`Scheduler`] (built via [`SchedulerBuilder`]);
//! everything else here is the machinery behind it.
//!
//! Internal modules:
//! - [`state`]: run states, job registry and display order;
//! - [`queue`]: primary/retry FIFO queues and the in-flight gauge;
//! - [`engine`]: shared state, coordinator loop, drain/dispatch/completion;
//! - [`runner`]: executes one attempt with timeout, panic isolation and events;
//! - [`awaiter`]: per-job completion signals for `run_one_now`;
//! - [`snapshot`]: run views and the watch-based snapshot emitter;
//! - [`scheduler`]: the public control surface.

mod awaiter;
mod builder;
mod config;
mod engine;
mod queue;
mod runner;
mod scheduler;
mod snapshot;
mod state;

pub use builder::SchedulerBuilder;
pub use config::SchedulerConfig;
pub use scheduler::{Prune, Removal, Scheduler, SchedulerStats};
pub use snapshot::{RunView, Runs};
pub use state::{JobKey, RunState, RunStatus};
