//! # Run a single attempt of a job.
//!
//! Executes one handler invocation with optional timeout and panic isolation,
//! and publishes the attempt-level events.
//!
//! ## Event flow
//! ```text
//! Success:
//!   handler.run() → Ok(())            → (coordinator publishes TaskSucceeded)
//!
//! Failure:
//!   handler.run() → Err(e)            → publish TaskFailed
//!
//! Panic:
//!   handler.run() panics              → publish TaskFailed("handler panicked: ...")
//!
//! Timeout:
//!   timeout exceeded → drop future    → publish TimeoutHit
//!                                     → publish TaskFailed (timeout)
//! ```
//!
//! ## Rules
//! - A panic never escapes: the worker must always report back to the coordinator,
//!   otherwise its slot and the job's `running` status would leak.
//! - State transitions are not decided here; the coordinator applies the outcome.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time;

use crate::{
    core::RunView,
    error::TaskError,
    events::{Bus, Event, EventKind},
    tasks::{Handler, RunContext},
};

/// Executes one attempt of `job`, publishing attempt-level events to `bus`.
pub(crate) async fn run_once<T>(
    handler: &dyn Handler<T>,
    job: RunView<T>,
    ctx: RunContext,
    timeout: Option<Duration>,
    bus: &Bus,
) -> Result<(), TaskError>
where
    T: Send + 'static,
{
    let key = job.key.clone();
    let attempt = ctx.attempt();
    let guarded = AssertUnwindSafe(handler.run(job, ctx)).catch_unwind();

    let res = match timeout {
        Some(dur) => match time::timeout(dur, guarded).await {
            Ok(r) => r,
            Err(_elapsed) => {
                bus.publish(
                    Event::new(EventKind::TimeoutHit)
                        .with_task(key.clone())
                        .with_attempt(attempt)
                        .with_timeout(dur),
                );
                Ok(Err(TaskError::Timeout { timeout: dur }))
            }
        },
        None => guarded.await,
    };

    let res = res.unwrap_or_else(|panic| {
        Err(TaskError::fail(format!(
            "handler panicked: {}",
            panic_message(&*panic)
        )))
    });

    if let Err(e) = &res {
        bus.publish(
            Event::new(EventKind::TaskFailed)
                .with_task(key)
                .with_attempt(attempt)
                .with_reason(e.to_string()),
        );
    }
    res
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RunState;
    use crate::tasks::{HandlerFn, ProgressSink, RunMode};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    struct Nop;
    impl ProgressSink for Nop {
        fn progress(&self, _: &str, _: u64, _: u8) {}
        fn stream_status(&self, _: &str, _: u64, _: String) {}
    }

    fn job() -> (RunView<()>, RunContext) {
        let key: Arc<str> = Arc::from("job");
        let view = RunView {
            key: key.clone(),
            record: (),
            state: RunState::default(),
        };
        let ctx = RunContext::new(
            key,
            1,
            1,
            RunMode::Batch,
            CancellationToken::new(),
            Arc::new(Nop),
        );
        (view, ctx)
    }

    #[tokio::test]
    async fn timeout_is_a_failure() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let h = HandlerFn::new(|_job: RunView<()>, _ctx: RunContext| async {
            time::sleep(Duration::from_secs(30)).await;
            Ok::<(), TaskError>(())
        });
        let (view, ctx) = job();

        let res = run_once(&h, view, ctx, Some(Duration::from_millis(20)), &bus).await;
        assert_eq!(
            res,
            Err(TaskError::Timeout {
                timeout: Duration::from_millis(20)
            })
        );
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::TimeoutHit);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::TaskFailed);
    }

    #[tokio::test]
    async fn panic_becomes_failure() {
        let bus = Bus::new(16);
        let h = HandlerFn::new(|job: RunView<()>, _ctx: RunContext| async move {
            if &*job.key == "job" {
                panic!("provider client exploded");
            }
            Ok::<(), TaskError>(())
        });
        let (view, ctx) = job();

        let res = run_once(&h, view, ctx, None, &bus).await;
        assert_eq!(
            res,
            Err(TaskError::fail("handler panicked: provider client exploded"))
        );
    }

    #[tokio::test]
    async fn success_publishes_nothing() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let h = HandlerFn::new(|_job: RunView<()>, _ctx: RunContext| async {
            Ok::<(), TaskError>(())
        });
        let (view, ctx) = job();

        assert_eq!(run_once(&h, view, ctx, None, &bus).await, Ok(()));
        assert!(rx.try_recv().is_err());
    }
}
