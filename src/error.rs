//! Error types used by the batchvisor scheduler and job handlers.
//!
//! This module defines two main error enums:
//!
//! - [`SchedulerError`] - errors surfaced by the control surface to a caller that
//!   awaited a specific job.
//! - [`TaskError`] - failures returned by a handler for one attempt.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the scheduler control surface.
///
/// Batch-mode failures are never raised; they are recorded on the run state.
/// These variants only reach callers of [`Scheduler::run_one_now`](crate::Scheduler::run_one_now)
/// and [`Scheduler::rerun_if_failed`](crate::Scheduler::rerun_if_failed).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// No job with this key is registered.
    #[error("unknown task {id:?}")]
    UnknownTask {
        /// The requested job key.
        id: String,
    },

    /// The job exhausted its retry budget.
    #[error("task {id:?} failed: {error}")]
    Failed {
        /// The job key.
        id: String,
        /// Last failure message recorded for the job.
        error: String,
    },

    /// The job was withdrawn (abandoned, deleted or reset) before it finished.
    #[error("task {id:?} was abandoned")]
    Abandoned {
        /// The job key.
        id: String,
    },

    /// The scheduler was shut down.
    #[error("scheduler closed")]
    Closed,
}

impl SchedulerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use batchvisor::SchedulerError;
    ///
    /// let err = SchedulerError::UnknownTask { id: "post-1".into() };
    /// assert_eq!(err.as_label(), "scheduler_unknown_task");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulerError::UnknownTask { .. } => "scheduler_unknown_task",
            SchedulerError::Failed { .. } => "scheduler_task_failed",
            SchedulerError::Abandoned { .. } => "scheduler_task_abandoned",
            SchedulerError::Closed => "scheduler_closed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SchedulerError::UnknownTask { id } => format!("unknown task: {id}"),
            SchedulerError::Failed { id, error } => format!("task {id} failed: {error}"),
            SchedulerError::Abandoned { id } => format!("task {id} abandoned"),
            SchedulerError::Closed => "scheduler closed".to_string(),
        }
    }
}

/// # Errors produced by one handler attempt.
///
/// The scheduler does not interpret causes: every variant consumes one unit of the
/// retry budget.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Attempt exceeded the configured per-attempt timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Handler rejected.
    #[error("{error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    ///
    /// # Example
    /// ```
    /// use batchvisor::TaskError;
    ///
    /// let err = TaskError::fail("provider returned 429");
    /// assert_eq!(err.to_string(), "provider returned 429");
    /// ```
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fail { .. } => "task_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            TaskError::Fail { error } => format!("error: {error}"),
        }
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        TaskError::Fail {
            error: format!("{err:#}"),
        }
    }
}

impl From<String> for TaskError {
    fn from(error: String) -> Self {
        TaskError::Fail { error }
    }
}

impl From<&str> for TaskError {
    fn from(error: &str) -> Self {
        TaskError::fail(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anyhow_context_is_preserved() {
        let err = anyhow::anyhow!("connection reset").context("openai request");
        let task: TaskError = err.into();
        assert_eq!(task.to_string(), "openai request: connection reset");
        assert_eq!(task.as_label(), "task_failed");
    }

    #[test]
    fn timeout_message() {
        let err = TaskError::Timeout {
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "timed out after 250ms");
        assert_eq!(err.as_message(), "timeout: 250ms");
    }

    #[test]
    fn failed_carries_last_error() {
        let err = SchedulerError::Failed {
            id: "a".into(),
            error: "boom".into(),
        };
        assert_eq!(err.as_label(), "scheduler_task_failed");
        assert_eq!(err.to_string(), "task \"a\" failed: boom");
    }
}
