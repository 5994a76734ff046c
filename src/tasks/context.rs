//! # Per-attempt context handed to handlers.
//!
//! [`RunContext`] is how a handler reports live progress back to the scheduler
//! while it runs. Updates land in the job's run state and show up in the next run
//! snapshot. Updates from an attempt that has since been detached (job deleted,
//! abandoned or reset while running) are silently ignored.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::JobKey;

/// Whether an attempt was dispatched by the batch loop or by a direct
/// [`Scheduler::run_one_now`](crate::Scheduler::run_one_now) call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Pulled from the shared queues by the batch drain.
    Batch,
    /// Forced by a caller awaiting this job.
    Single,
}

impl RunMode {
    /// Returns a short stable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Batch => "batch",
            RunMode::Single => "single",
        }
    }
}

/// Receiver of live updates from running attempts.
pub(crate) trait ProgressSink: Send + Sync + 'static {
    fn progress(&self, key: &str, run_id: u64, pct: u8);
    fn stream_status(&self, key: &str, run_id: u64, text: String);
}

/// Context for one handler attempt.
///
/// Cheap to clone; clones report for the same attempt.
#[derive(Clone)]
pub struct RunContext {
    key: JobKey,
    run_id: u64,
    attempt: u32,
    mode: RunMode,
    token: CancellationToken,
    sink: Arc<dyn ProgressSink>,
}

impl RunContext {
    pub(crate) fn new(
        key: JobKey,
        run_id: u64,
        attempt: u32,
        mode: RunMode,
        token: CancellationToken,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            key,
            run_id,
            attempt,
            mode,
            token,
            sink,
        }
    }

    /// Key of the job being run.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 1-based attempt number (`retry_count + 1` at dispatch).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// How this attempt was dispatched.
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Cancelled when the scheduler shuts down.
    ///
    /// Cancellation is cooperative: the scheduler never aborts a running handler.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Sets the job's progress; values above 100 are clamped.
    pub fn set_progress(&self, pct: u8) {
        self.sink.progress(&self.key, self.run_id, pct.min(100));
    }

    /// Sets the job's free-form stream annotation (e.g. "generating outline").
    pub fn set_stream_status(&self, text: impl Into<String>) {
        self.sink.stream_status(&self.key, self.run_id, text.into());
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("key", &self.key)
            .field("attempt", &self.attempt)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, u64, String)>>);

    impl ProgressSink for Recorder {
        fn progress(&self, key: &str, run_id: u64, pct: u8) {
            self.0
                .lock()
                .unwrap()
                .push((key.to_string(), run_id, pct.to_string()));
        }
        fn stream_status(&self, key: &str, run_id: u64, text: String) {
            self.0.lock().unwrap().push((key.to_string(), run_id, text));
        }
    }

    #[test]
    fn progress_is_clamped_and_tagged_with_run() {
        let sink = Arc::new(Recorder::default());
        let ctx = RunContext::new(
            Arc::from("post-7"),
            42,
            2,
            RunMode::Single,
            CancellationToken::new(),
            sink.clone(),
        );

        ctx.set_progress(250);
        ctx.set_stream_status("outline");

        let seen = sink.0.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("post-7".to_string(), 42, "100".to_string()),
                ("post-7".to_string(), 42, "outline".to_string()),
            ]
        );
        assert_eq!(ctx.attempt(), 2);
        assert_eq!(ctx.mode().as_str(), "single");
    }
}
