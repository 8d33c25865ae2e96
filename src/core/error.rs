//! Error types for scheduler operations.

use std::fmt;

use thiserror::Error;

use crate::core::task::{Lane, TaskId};

/// Which argument a rejected delay was passed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayKind {
    /// Macrotask delay.
    Delay,
    /// Throttle interval.
    Interval,
    /// Debounce maximum wait.
    MaxWait,
}

impl fmt::Display for DelayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Delay => "delay",
            Self::Interval => "interval",
            Self::MaxWait => "max wait",
        };
        f.write_str(name)
    }
}

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A negative delay, interval or wait was passed at scheduling time.
    #[error("invalid {what}: {value_ms}ms is negative")]
    InvalidDelay {
        /// Argument that carried the value.
        what: DelayKind,
        /// Rejected value in milliseconds.
        value_ms: i64,
    },
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The cross-thread inbox is at capacity.
    #[error("remote inbox full")]
    InboxFull,
    /// The scheduler behind a remote handle no longer exists.
    #[error("scheduler disconnected")]
    Disconnected,
    /// A task's callable returned an error or panicked.
    #[error(transparent)]
    CallableFailure(#[from] TaskFailure),
}

/// Failure of a single executed task, handed to the error handler.
#[derive(Debug, Error)]
#[error("{lane} task {task_id}{} failed: {error:#}", .label.map(|l| format!(" ({l})")).unwrap_or_default())]
pub struct TaskFailure {
    /// Identity of the failed task.
    pub task_id: TaskId,
    /// Lane the task ran on.
    pub lane: Lane,
    /// Optional label given at scheduling time.
    pub label: Option<&'static str>,
    /// Error returned by the callable, or the panic message.
    pub error: anyhow::Error,
}

impl SchedulerError {
    /// Reject negative millisecond values, passing non-negative ones through.
    pub fn check_delay(what: DelayKind, value_ms: i64) -> Result<u64, Self> {
        u64::try_from(value_ms).map_err(|_| Self::InvalidDelay { what, value_ms })
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
