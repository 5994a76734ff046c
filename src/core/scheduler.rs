//! # Scheduler: the public control surface.
//!
//! [`Scheduler`] is a cheap, clonable handle over the shared engine state. Every
//! method takes the engine lock once, applies its change, republishes the snapshot
//! and returns; only [`Scheduler::run_one_now`] and [`Scheduler::rerun_if_failed`]
//! suspend, and only on the job's outcome.
//!
//! ## State machine
//! ```text
//!            load/enqueue          drain            Ok
//!   idle ───────────────► queued ───────► running ─────► succeeded
//!                            ▲               │
//!                            │ slot/timer    │ Err, budget left
//!                            └─ retry_queued ◄┘
//!                                            │ Err, budget spent
//!                                            └────────► failed
//!
//!   any ── remove_task(Abandon) / prune ──► abandoned
//!   idle | failed | abandoned | succeeded ── enqueue ──► queued
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use batchvisor::{
//!     HandlerFn, HandlerRef, RunContext, RunStatus, RunView, Scheduler, SchedulerConfig, TaskError,
//! };
//!
//! #[derive(Clone)]
//! struct Article { slug: String }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = SchedulerConfig::default();
//!     cfg.max_concurrency = 2;
//!
//!     let handler: HandlerRef<Article> = HandlerFn::arc(|job: RunView<Article>, ctx: RunContext| async move {
//!         ctx.set_stream_status(format!("writing {}", job.record.slug));
//!         ctx.set_progress(50);
//!         Ok::<(), TaskError>(())
//!     });
//!     let scheduler = Scheduler::builder(cfg)
//!         .build(|a: &Article| Arc::from(a.slug.as_str()), handler);
//!
//!     scheduler.load_task(Article { slug: "best-espresso-grinders".into() });
//!     scheduler.run_one_now("best-espresso-grinders").await?;
//!
//!     let run = scheduler.get_run("best-espresso-grinders").unwrap();
//!     assert_eq!(run.status(), RunStatus::Succeeded);
//!     assert_eq!(run.state.progress, 100);
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use super::{
    builder::SchedulerBuilder,
    config::SchedulerConfig,
    engine::{Inner, Shared},
    snapshot::{RunView, Runs},
    state::{JobKey, RunStatus},
};
use crate::{
    error::SchedulerError,
    events::{Event, EventKind},
};

/// What `load_tasks` does with keys absent from the new record set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Prune {
    /// Leave them as they are.
    #[default]
    None,
    /// Mark them `abandoned` and drop them from the queues; rows stay visible.
    Abandon,
    /// Remove rows and run state entirely.
    Delete,
}

/// How `remove_task` removes a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Removal {
    /// Mark `abandoned`, keep the row.
    Abandon,
    /// Remove row and run state.
    Delete,
}

/// Point-in-time engine gauges.
///
/// Diagnostics only; the snapshot never exposes these.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Handler invocations in flight.
    pub active: usize,
    /// Keys waiting in the primary queue.
    pub queued: usize,
    /// Keys waiting in the retry queue.
    pub retry_queued: usize,
    /// Forced single runs waiting for a slot.
    pub waiting_single: usize,
    /// Registered jobs.
    pub tasks: usize,
    /// Batch running flag.
    pub running: bool,
}

/// Handle to a bounded-concurrency batch scheduler.
///
/// Clones share the same engine. Dropping the last handle stops the coordinator.
pub struct Scheduler<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Scheduler<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Scheduler<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Starts building a scheduler with the given configuration.
    pub fn builder(cfg: SchedulerConfig) -> SchedulerBuilder<T> {
        SchedulerBuilder::new(cfg)
    }

    pub(crate) fn from_shared(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }

    // ---- registry ----

    /// Replaces the job set.
    ///
    /// Every record is upserted. Jobs that are idle or terminal are queued again
    /// with error and progress cleared; jobs already queued, retrying or running
    /// keep their state. Keys missing from `records` are handled per `prune`.
    pub fn load_tasks(&self, records: impl IntoIterator<Item = T>, prune: Prune) {
        let shared = &self.shared;
        shared.mutate(|inner| {
            let mut seen: HashSet<JobKey> = HashSet::new();
            for record in records {
                let key = (shared.identity)(&record);
                seen.insert(key.clone());
                self.admit(inner, key, record);
            }

            if prune != Prune::None {
                let stale: Vec<JobKey> = inner
                    .store
                    .keys()
                    .filter(|k| !seen.contains(*k))
                    .cloned()
                    .collect();
                for key in stale {
                    match prune {
                        Prune::Abandon => {
                            let abandoned = inner
                                .store
                                .entry(&key)
                                .is_some_and(|e| e.state.status == RunStatus::Abandoned);
                            if !abandoned {
                                shared.abandon(inner, &key, "absent from reload");
                            }
                        }
                        Prune::Delete => shared.delete(inner, &key),
                        Prune::None => {}
                    }
                }
            }

            shared.drain(inner);
        });
    }

    /// Upserts a single record; nothing is pruned.
    pub fn load_task(&self, record: T) {
        let key = (self.shared.identity)(&record);
        self.shared.mutate(|inner| {
            self.admit(inner, key, record);
            self.shared.drain(inner);
        });
    }

    fn admit(&self, inner: &mut Inner<T>, key: JobKey, record: T) {
        if inner.store.upsert(key.clone(), record) {
            self.shared
                .publish(Event::new(EventKind::TaskLoaded).with_task(key.clone()));
        }
        let Some(entry) = inner.store.entry_mut(&key) else {
            return;
        };
        if !entry.state.status.is_enqueueable() {
            return;
        }
        entry.state.requeue();
        inner.queues.push_primary(key.clone());
        self.shared
            .publish(Event::new(EventKind::TaskQueued).with_task(key));
    }

    /// Removes one job. Returns `false` if the id is unknown.
    ///
    /// A run in flight is detached and its result discarded. Callers awaiting the
    /// job get [`SchedulerError::Abandoned`].
    pub fn remove_task(&self, id: &str, mode: Removal) -> bool {
        let shared = &self.shared;
        shared.mutate(|inner| {
            if inner.store.entry(id).is_none() {
                return false;
            }
            match mode {
                Removal::Abandon => shared.abandon(inner, id, "removed"),
                Removal::Delete => shared.delete(inner, id),
            }
            true
        })
    }

    /// Hard reset: clears queues, running flag, registry, run state and order.
    ///
    /// Handlers in flight are detached; each releases its slot when it finishes.
    pub fn remove_all_tasks(&self) {
        let shared = &self.shared;
        shared.mutate(|inner| {
            let was_running = inner.running;
            inner.queues.clear();
            inner.singles.clear();
            inner.forced.clear();
            inner.store.clear();
            inner.running = false;
            inner.awaiters.resolve_all(|id| {
                Err(SchedulerError::Abandoned { id: id.to_string() })
            });
            if was_running {
                shared.publish(Event::new(EventKind::BatchStopped).with_reason("reset"));
            }
        });
        tracing::debug!("scheduler reset");
    }

    // ---- queues ----

    /// Queues a job from `idle`, `failed`, `abandoned` or `succeeded`.
    ///
    /// Returns `false` (no-op) for unknown ids and other states.
    pub fn enqueue(&self, id: &str) -> bool {
        let shared = &self.shared;
        shared.mutate(|inner| {
            let Some(key) = inner.store.key(id) else {
                return false;
            };
            let Some(entry) = inner.store.entry_mut(&key) else {
                return false;
            };
            if !entry.state.status.is_enqueueable() {
                return false;
            }
            entry.state.requeue();
            inner.queues.push_primary(key.clone());
            shared.publish(Event::new(EventKind::TaskQueued).with_task(key));
            shared.drain(inner);
            true
        })
    }

    /// Withdraws a waiting job; it reverts to `idle`.
    ///
    /// Returns `false` for unknown ids and jobs that are not waiting. A running job
    /// cannot be interrupted.
    pub fn dequeue(&self, id: &str) -> bool {
        let shared = &self.shared;
        shared.mutate(|inner| {
            let Some(entry) = inner.store.entry_mut(id) else {
                return false;
            };
            if !entry.state.status.is_pending() {
                return false;
            }
            entry.state.status = RunStatus::Idle;
            inner.queues.remove(id);
            inner.singles.remove(id);
            inner.awaiters.resolve(
                id,
                Err(SchedulerError::Abandoned { id: id.to_string() }),
            );
            shared.publish(Event::new(EventKind::TaskDequeued).with_task(id));
            true
        })
    }

    /// True while the key sits in the primary or retry queue.
    ///
    /// A single run waiting for a slot and a batch retry still on its backoff
    /// timer are `queued`/`retry_queued` but not enqueued.
    pub fn is_enqueued(&self, id: &str) -> bool {
        self.shared.read(|inner| inner.queues.contains(id))
    }

    // ---- batch ----

    /// Sets the running flag and fills free slots from the queues.
    ///
    /// With nothing queued or in flight the batch stops again at once.
    pub fn start_all(&self) {
        let shared = &self.shared;
        shared.mutate(|inner| {
            if inner.closed {
                return;
            }
            if !inner.running {
                inner.running = true;
                shared.publish(Event::new(EventKind::BatchStarted));
            }
            shared.drain(inner);
        });
    }

    /// Clears the running flag. Handlers in flight keep running.
    pub fn stop_all(&self) {
        let shared = &self.shared;
        shared.mutate(|inner| {
            if inner.running {
                inner.running = false;
                shared.publish(Event::new(EventKind::BatchStopped));
            }
        });
    }

    pub fn is_running(&self) -> bool {
        self.shared.read(|inner| inner.running)
    }

    /// Queues every `failed` job again, then starts the batch.
    ///
    /// With `reset_retries` each job gets its full retry budget back. Without it the
    /// job is queued with `retry_count` still above `max_retries`, the one state
    /// outside `failed` where that holds, and a single further failure fails it
    /// again.
    pub fn start_failed_only(&self, reset_retries: bool) {
        let shared = &self.shared;
        shared.mutate(|inner| {
            for key in inner.store.keys_with(RunStatus::Failed) {
                let Some(entry) = inner.store.entry_mut(&key) else {
                    continue;
                };
                if reset_retries {
                    entry.state.retry_count = 0;
                }
                entry.state.requeue();
                inner.queues.push_primary(key.clone());
                shared.publish(Event::new(EventKind::TaskQueued).with_task(key));
            }
        });
        self.start_all();
    }

    // ---- single runs ----

    /// Runs one job now, outside the queues, even while the batch is paused.
    ///
    /// Waits for a free slot without occupying one, then resolves with the job's
    /// terminal outcome, its own retries included. If the job is already running
    /// the call attaches to that run, and the run's retries from then on wait for a
    /// slot of their own as well. Dropping the future does not cancel the run.
    ///
    /// A `failed` job keeps its spent retry budget: it runs once more and fails
    /// again on the next error. Use [`Scheduler::rerun_if_failed`] to reset it.
    ///
    /// # Errors
    /// - [`SchedulerError::UnknownTask`] if `id` is not registered;
    /// - [`SchedulerError::Failed`] once the retry budget is spent;
    /// - [`SchedulerError::Abandoned`] if the job is removed or dequeued meanwhile;
    /// - [`SchedulerError::Closed`] after [`Scheduler::shutdown`].
    pub async fn run_one_now(&self, id: &str) -> Result<(), SchedulerError> {
        let shared = &self.shared;
        let rx = shared.mutate(|inner| {
            if inner.closed {
                return Err(SchedulerError::Closed);
            }
            let Some(key) = inner.store.key(id) else {
                return Err(SchedulerError::UnknownTask { id: id.to_string() });
            };
            let running = inner
                .store
                .entry(&key)
                .is_some_and(|e| e.state.status == RunStatus::Running);
            let rx = inner.awaiters.register(key.clone());
            if running {
                inner.forced.insert(key);
                return Ok(rx);
            }
            if inner.singles.contains(&key) {
                return Ok(rx);
            }

            inner.queues.remove(&key);
            if let Some(entry) = inner.store.entry_mut(&key) {
                entry.state.requeue();
            }
            inner.singles.insert(key.clone());
            shared.await_slot(key, None);
            Ok(rx)
        })?;

        rx.await.unwrap_or(Err(SchedulerError::Closed))
    }

    /// Runs the job now if it is `failed`; otherwise resolves `Ok(())` at once.
    ///
    /// # Errors
    /// Same as [`Scheduler::run_one_now`].
    pub async fn rerun_if_failed(&self, id: &str, reset_retries: bool) -> Result<(), SchedulerError> {
        let failed = self.shared.mutate(|inner| -> Result<bool, SchedulerError> {
            let entry = inner
                .store
                .entry_mut(id)
                .ok_or_else(|| SchedulerError::UnknownTask { id: id.to_string() })?;
            if entry.state.status != RunStatus::Failed {
                return Ok(false);
            }
            if reset_retries {
                entry.state.retry_count = 0;
            }
            Ok(true)
        })?;

        if !failed {
            return Ok(());
        }
        self.run_one_now(id).await
    }

    // ---- reads ----

    /// Current view of one job.
    pub fn get_run(&self, id: &str) -> Option<RunView<T>> {
        self.shared.read(|inner| inner.store.view(id))
    }

    /// Current payload of one job.
    pub fn get_record(&self, id: &str) -> Option<T> {
        self.shared.read(|inner| inner.store.record(id).cloned())
    }

    /// Latest snapshot: every job in display order.
    pub fn runs(&self) -> Runs<T> {
        self.shared.emitter.current()
    }

    /// Receiver notified after every mutation with the new snapshot.
    pub fn watch_runs(&self) -> watch::Receiver<Runs<T>> {
        self.shared.emitter.subscribe()
    }

    /// Raw lifecycle event stream.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.shared.bus.subscribe()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.shared.read(|inner| SchedulerStats {
            active: inner.queues.active,
            queued: inner.queues.primary_len(),
            retry_queued: inner.queues.retry_len(),
            waiting_single: inner.singles.len(),
            tasks: inner.store.len(),
            running: inner.running,
        })
    }

    // ---- lifecycle ----

    /// Stops the scheduler.
    ///
    /// The coordinator exits, pending single runs are dropped and every awaiter
    /// receives [`SchedulerError::Closed`]. Handlers in flight see their
    /// cancellation token fire and finish detached.
    pub fn shutdown(&self) {
        let shared = &self.shared;
        shared.mutate(|inner| {
            if inner.closed {
                return;
            }
            inner.closed = true;
            inner.running = false;
            inner.singles.clear();
            inner.forced.clear();
            inner.awaiters.resolve_all(|_| Err(SchedulerError::Closed));
        });
        shared.close();
        tracing::debug!("scheduler shut down");
    }
}
