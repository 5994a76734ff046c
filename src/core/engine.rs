//! # Execution engine: the coordinator that owns all scheduling state.
//!
//! Every mutable field (registry, run states, queues, gauge, running flag,
//! awaiters) lives in one [`Inner`] behind one mutex. Control-surface calls lock
//! it directly; everything that happens *later* (handler completions, retry
//! timers, slots freed for single runs) arrives as a [`Command`] on an unbounded
//! channel consumed by a single coordinator task.
//!
//! ```text
//!   Scheduler::enqueue/start_all/...  ──lock──┐
//!                                             ▼
//!   worker ── Completed ──┐              ┌─────────┐
//!   timer  ── Requeue  ───┼─► commands ─►│  Inner  │─► snapshot (watch)
//!   waiter ── Dispatch ───┘  (mpsc)      └────┬────┘
//!                                             │ drain(): try_acquire slot, dispatch
//!                                             ▼
//!                                 tokio::spawn(run_once(handler, job))
//! ```
//!
//! ## Rules
//! - The mutex is never held across an `.await`.
//! - A drain pass never blocks: batch dispatch uses `try_acquire_owned` and stops at
//!   the first refusal. Freed slots are refilled by the completion that freed them.
//! - A slot permit travels with its completion and is released only after the
//!   gauge has been decremented, so `active ≤ max_concurrency` always holds.
//! - A completion is applied only if its run is still the job's live run;
//!   otherwise it just releases the slot (deleted, abandoned or reset meanwhile).

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use super::{
    awaiter::Awaiters,
    config::SchedulerConfig,
    queue::Queues,
    runner::run_once,
    snapshot::Emitter,
    state::{JobKey, RunStatus, Store},
};
use crate::{
    error::{SchedulerError, TaskError},
    events::{Bus, Event, EventKind},
    tasks::{HandlerRef, ProgressSink, RunContext, RunMode},
};

/// Caller-supplied key function.
pub(crate) type Identity<T> = Arc<dyn Fn(&T) -> JobKey + Send + Sync>;

/// Deferred work funneled back to the coordinator.
pub(crate) enum Command {
    /// Run a drain pass.
    Drain,
    /// A forced single run obtained its slot.
    Dispatch {
        key: JobKey,
        permit: OwnedSemaphorePermit,
    },
    /// A batch retry finished its backoff timer.
    Requeue { key: JobKey, run_id: u64 },
    /// A handler attempt finished.
    Completed {
        key: JobKey,
        run_id: u64,
        mode: RunMode,
        outcome: Result<(), TaskError>,
        permit: OwnedSemaphorePermit,
    },
}

/// All mutable scheduling state.
pub(crate) struct Inner<T> {
    pub store: Store<T>,
    pub queues: Queues,
    pub awaiters: Awaiters,
    /// Forced single runs waiting for a slot outside the shared queues.
    pub singles: HashSet<JobKey>,
    /// Batch runs a `run_one_now` caller joined; their retries follow single mode.
    pub forced: HashSet<JobKey>,
    /// Batch retries waiting on a backoff timer.
    pub delayed: usize,
    pub running: bool,
    pub closed: bool,
    next_run: u64,
}

impl<T> Default for Inner<T> {
    fn default() -> Self {
        Self {
            store: Store::default(),
            queues: Queues::default(),
            awaiters: Awaiters::default(),
            singles: HashSet::new(),
            forced: HashSet::new(),
            delayed: 0,
            running: false,
            closed: false,
            next_run: 1,
        }
    }
}

/// State shared by the scheduler handle, the coordinator and progress reporting.
pub(crate) struct Shared<T> {
    inner: Mutex<Inner<T>>,
    pub cfg: SchedulerConfig,
    pub identity: Identity<T>,
    pub bus: Bus,
    pub emitter: Emitter<T>,
    pub token: CancellationToken,
    handler: HandlerRef<T>,
    semaphore: Arc<Semaphore>,
    commands: mpsc::UnboundedSender<Command>,
    sink: Arc<dyn ProgressSink>,
}

impl<T> Shared<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Builds the shared state and spawns the coordinator.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(
        cfg: SchedulerConfig,
        identity: Identity<T>,
        handler: HandlerRef<T>,
        bus: Bus,
        token: CancellationToken,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(cfg.concurrency()));

        let shared = Arc::new_cyclic(|me: &Weak<Self>| Self {
            inner: Mutex::new(Inner::default()),
            cfg,
            identity,
            bus,
            emitter: Emitter::new(),
            token: token.clone(),
            handler,
            semaphore,
            commands: tx,
            sink: Arc::new(Progress { shared: me.clone() }),
        });

        tokio::spawn(coordinate(Arc::downgrade(&shared), rx, token));
        shared
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` under the lock, then republishes the snapshot.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut Inner<T>) -> R) -> R {
        let mut inner = self.lock();
        let out = f(&mut inner);
        self.emitter.publish(inner.store.views());
        out
    }

    /// Runs `f` under the lock without publishing.
    pub fn read<R>(&self, f: impl FnOnce(&Inner<T>) -> R) -> R {
        f(&self.lock())
    }

    pub fn publish(&self, ev: Event) {
        self.bus.publish(ev);
    }

    /// Stops the coordinator and refuses further slot acquisition.
    pub fn close(&self) {
        self.token.cancel();
        self.semaphore.close();
    }

    fn handle(&self, cmd: Command) {
        self.mutate(|inner| match cmd {
            Command::Drain => self.drain(inner),
            Command::Dispatch { key, permit } => self.dispatch_single(inner, key, permit),
            Command::Requeue { key, run_id } => self.requeue(inner, key, run_id),
            Command::Completed {
                key,
                run_id,
                mode,
                outcome,
                permit,
            } => self.complete(inner, key, run_id, mode, outcome, permit),
        });
    }

    /// Dispatches queued keys while the batch runs and slots are free.
    ///
    /// Clears the running flag once nothing is queued, delayed or in flight.
    pub fn drain(&self, inner: &mut Inner<T>) {
        if !inner.running || inner.closed {
            return;
        }

        while !inner.queues.is_empty() {
            let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
                break;
            };
            let Some((key, lane)) = inner.queues.take_next() else {
                break;
            };
            if !inner.store.has_record(&key) {
                self.abandon(inner, &key, "record vanished before dispatch");
                continue;
            }
            let pending = inner
                .store
                .entry(&key)
                .is_some_and(|e| e.state.status.is_pending());
            if !pending {
                // stale duplicate
                continue;
            }
            tracing::trace!(task = %key, ?lane, "dispatching from queue");
            self.dispatch(inner, key, permit, RunMode::Batch);
        }

        if inner.queues.is_empty() && inner.queues.active == 0 && inner.delayed == 0 {
            inner.running = false;
            self.publish(Event::new(EventKind::BatchDrained));
        }
    }

    /// Marks the job running and spawns its handler invocation.
    fn dispatch(
        &self,
        inner: &mut Inner<T>,
        key: JobKey,
        permit: OwnedSemaphorePermit,
        mode: RunMode,
    ) {
        let run_id = inner.next_run;
        let Some(entry) = inner.store.entry_mut(&key) else {
            return;
        };
        entry.state.status = RunStatus::Running;
        entry.state.error = None;
        entry.state.progress = 0;
        entry.run_id = Some(run_id);
        let attempt = entry.state.retry_count.saturating_add(1);

        let Some(job) = inner.store.view(&key) else {
            return;
        };
        inner.next_run += 1;
        inner.queues.active += 1;

        self.publish(
            Event::new(EventKind::TaskStarting)
                .with_task(key.clone())
                .with_attempt(attempt)
                .with_reason(mode.as_str()),
        );

        let ctx = RunContext::new(
            key.clone(),
            run_id,
            attempt,
            mode,
            self.token.child_token(),
            Arc::clone(&self.sink),
        );
        let handler = Arc::clone(&self.handler);
        let bus = self.bus.clone();
        let tx = self.commands.clone();
        let timeout = self.cfg.attempt_timeout();

        tokio::spawn(async move {
            let outcome = run_once(handler.as_ref(), job, ctx, timeout, &bus).await;
            let _ = tx.send(Command::Completed {
                key,
                run_id,
                mode,
                outcome,
                permit,
            });
        });
    }

    fn dispatch_single(&self, inner: &mut Inner<T>, key: JobKey, permit: OwnedSemaphorePermit) {
        // Withdrawn while waiting (dequeue, abandon, delete, reset).
        if !inner.singles.remove(&key) {
            drop(permit);
            self.drain(inner);
            return;
        }
        if !inner.store.has_record(&key) {
            drop(permit);
            self.abandon(inner, &key, "record vanished before dispatch");
            self.drain(inner);
            return;
        }
        self.dispatch(inner, key, permit, RunMode::Single);
    }

    fn requeue(&self, inner: &mut Inner<T>, key: JobKey, run_id: u64) {
        inner.delayed = inner.delayed.saturating_sub(1);
        let due = inner.store.has_record(&key)
            && inner.store.entry(&key).is_some_and(|e| {
                e.state.status == RunStatus::RetryQueued && e.run_id == Some(run_id)
            })
            && !inner.singles.contains(&key)
            && !inner.queues.contains(&key);
        if due {
            inner.queues.push_retry(key);
        }
        self.drain(inner);
    }

    /// Applies one attempt's outcome.
    fn complete(
        &self,
        inner: &mut Inner<T>,
        key: JobKey,
        run_id: u64,
        mode: RunMode,
        outcome: Result<(), TaskError>,
        permit: OwnedSemaphorePermit,
    ) {
        inner.queues.active = inner.queues.active.saturating_sub(1);
        drop(permit);

        let live = inner.store.has_record(&key)
            && inner.store.entry(&key).is_some_and(|e| e.is_current(run_id));
        if !live {
            tracing::debug!(task = %key, run_id, "discarding result of detached run");
            self.drain(inner);
            return;
        }
        let mode = if inner.forced.remove(&key) {
            RunMode::Single
        } else {
            mode
        };
        let Some(entry) = inner.store.entry_mut(&key) else {
            return;
        };
        let attempt = entry.state.retry_count.saturating_add(1);

        match outcome {
            Ok(()) => {
                entry.state.status = RunStatus::Succeeded;
                entry.state.progress = 100;
                entry.state.error = None;
                entry.state.retry_count = 0;

                self.publish(
                    Event::new(EventKind::TaskSucceeded)
                        .with_task(key.clone())
                        .with_attempt(attempt),
                );
                inner.awaiters.resolve(&key, Ok(()));

                match (mode, self.cfg.inter_job_delay()) {
                    (RunMode::Batch, Some(delay)) => self.send_after(delay, Command::Drain),
                    _ => self.drain(inner),
                }
            }
            Err(err) => {
                let message = err.to_string();
                entry.state.retry_count = entry.state.retry_count.saturating_add(1);
                entry.state.error = Some(message.clone());
                let retry = entry.state.retry_count;

                if retry <= self.cfg.max_retries {
                    entry.state.status = RunStatus::RetryQueued;
                    self.schedule_retry(inner, key, run_id, mode, retry, message);
                } else {
                    entry.state.status = RunStatus::Failed;
                    self.publish(
                        Event::new(EventKind::TaskExhausted)
                            .with_task(key.clone())
                            .with_attempt(attempt)
                            .with_reason(message.clone()),
                    );
                    inner.awaiters.resolve(
                        &key,
                        Err(SchedulerError::Failed {
                            id: key.to_string(),
                            error: message,
                        }),
                    );
                }
                self.drain(inner);
            }
        }
    }

    /// Sends a failed job back towards execution.
    ///
    /// Batch runs go to the back of the retry queue. Single runs wait for a slot of
    /// their own and bypass the shared queues.
    fn schedule_retry(
        &self,
        inner: &mut Inner<T>,
        key: JobKey,
        run_id: u64,
        mode: RunMode,
        retry: u32,
        message: String,
    ) {
        let delay = self.cfg.retry_delay(retry);
        let mut ev = Event::new(EventKind::RetryScheduled)
            .with_task(key.clone())
            .with_attempt(retry)
            .with_reason(message);
        if let Some(d) = delay {
            ev = ev.with_delay(d);
        }
        self.publish(ev);

        match (mode, delay) {
            (RunMode::Batch, None) => inner.queues.push_retry(key),
            (RunMode::Batch, Some(d)) => {
                inner.delayed += 1;
                self.send_after(d, Command::Requeue { key, run_id });
            }
            (RunMode::Single, delay) => {
                inner.singles.insert(key.clone());
                self.await_slot(key, delay);
            }
        }
    }

    /// Spawns a waiter that obtains a slot for a forced single run, outside the
    /// shared queues, then hands it to the coordinator.
    pub fn await_slot(&self, key: JobKey, delay: Option<Duration>) {
        let semaphore = Arc::clone(&self.semaphore);
        let tx = self.commands.clone();
        let token = self.token.clone();

        tokio::spawn(async move {
            if let Some(d) = delay {
                tokio::select! {
                    _ = tokio::time::sleep(d) => {}
                    _ = token.cancelled() => return,
                }
            }
            let permit = tokio::select! {
                res = semaphore.acquire_owned() => match res {
                    Ok(permit) => permit,
                    Err(_closed) => return,
                },
                _ = token.cancelled() => return,
            };
            let _ = tx.send(Command::Dispatch { key, permit });
        });
    }

    fn send_after(&self, delay: Duration, cmd: Command) {
        let tx = self.commands.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => { let _ = tx.send(cmd); }
                _ = token.cancelled() => {}
            }
        });
    }

    /// Withdraws a job from scheduling while keeping its row.
    ///
    /// A run in flight is detached: its result will be discarded.
    pub fn abandon(&self, inner: &mut Inner<T>, key: &str, reason: &str) {
        inner.queues.remove(key);
        inner.singles.remove(key);
        inner.forced.remove(key);
        if let Some(entry) = inner.store.entry_mut(key) {
            entry.state.status = RunStatus::Abandoned;
        }
        inner.awaiters.resolve(
            key,
            Err(SchedulerError::Abandoned { id: key.to_string() }),
        );
        self.publish(
            Event::new(EventKind::TaskAbandoned)
                .with_task(key)
                .with_reason(reason),
        );
    }

    /// Removes a job's row, state and queue entries.
    pub fn delete(&self, inner: &mut Inner<T>, key: &str) {
        inner.queues.remove(key);
        inner.singles.remove(key);
        inner.forced.remove(key);
        inner.store.delete(key);
        inner.awaiters.resolve(
            key,
            Err(SchedulerError::Abandoned { id: key.to_string() }),
        );
        self.publish(Event::new(EventKind::TaskRemoved).with_task(key));
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Coordinator loop: applies deferred commands one at a time.
///
/// Holds only a weak reference so dropping every `Scheduler` handle ends it.
async fn coordinate<T>(
    shared: Weak<Shared<T>>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    token: CancellationToken,
) where
    T: Clone + Send + Sync + 'static,
{
    loop {
        let cmd = tokio::select! {
            _ = token.cancelled() => break,
            cmd = rx.recv() => match cmd {
                Some(cmd) => cmd,
                None => break,
            },
        };
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.handle(cmd);
    }
    tracing::debug!("scheduler coordinator stopped");
}

/// Routes handler progress reports into the run state.
struct Progress<T> {
    shared: Weak<Shared<T>>,
}

impl<T> ProgressSink for Progress<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn progress(&self, key: &str, run_id: u64, pct: u8) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        shared.mutate(|inner| {
            if let Some(entry) = inner.store.entry_mut(key).filter(|e| e.is_current(run_id)) {
                entry.state.progress = pct.min(100);
            }
        });
    }

    fn stream_status(&self, key: &str, run_id: u64, text: String) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        shared.mutate(|inner| {
            if let Some(entry) = inner.store.entry_mut(key).filter(|e| e.is_current(run_id)) {
                entry.state.stream_status = Some(text);
            }
        });
    }
}
