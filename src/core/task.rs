//! Task records and cancellation handles.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::util::clock::Millis;

/// Insertion sequence number, unique per scheduler.
pub type TaskId = u64;

/// Outcome of a task's callable.
pub type TaskResult = anyhow::Result<()>;

/// Boxed zero-argument unit of work.
pub(crate) type TaskFn = Box<dyn FnOnce() -> TaskResult>;

/// Queue a task was routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// FIFO queue drained before any macrotask.
    Microtask,
    /// Time-gated queue ordered by ready time.
    Macrotask,
    /// Executed synchronously by a rate-limiting policy.
    Inline,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Microtask => "microtask",
            Self::Macrotask => "macrotask",
            Self::Inline => "inline",
        };
        f.write_str(name)
    }
}

/// Status of a task in the scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Queued and not yet run.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Returned an error or panicked.
    Failed,
    /// Cancelled before it ran.
    Cancelled,
}

/// A queued unit of deferred work. Owned by the queue holding it.
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) lane: Lane,
    pub(crate) label: Option<&'static str>,
    pub(crate) ready_at: Millis,
    pub(crate) status: Rc<Cell<TaskStatus>>,
    pub(crate) run: TaskFn,
}

impl Task {
    pub(crate) fn new(
        id: TaskId,
        lane: Lane,
        label: Option<&'static str>,
        ready_at: Millis,
        run: TaskFn,
    ) -> Self {
        Self {
            id,
            lane,
            label,
            ready_at,
            status: Rc::new(Cell::new(TaskStatus::Pending)),
            run,
        }
    }

    /// Handle sharing this task's status cell.
    pub(crate) fn handle(&self) -> CancelHandle {
        CancelHandle {
            id: self.id,
            lane: self.lane,
            status: Rc::clone(&self.status),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.status.get() == TaskStatus::Cancelled
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("lane", &self.lane)
            .field("label", &self.label)
            .field("ready_at", &self.ready_at)
            .field("status", &self.status.get())
            .finish_non_exhaustive()
    }
}

/// Handle returned when scheduling a cancellable task.
///
/// Cancelling through [`crate::core::Scheduler::cancel`] only affects a task
/// that is still pending; anything else is a no-op.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    id: TaskId,
    lane: Lane,
    status: Rc<Cell<TaskStatus>>,
}

impl CancelHandle {
    /// Identity of the referenced task.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Lane the task was queued on.
    #[must_use]
    pub const fn lane(&self) -> Lane {
        self.lane
    }

    /// Current status of the referenced task.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.status.get()
    }

    /// Whether the task is still waiting to run.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status.get() == TaskStatus::Pending
    }

    /// Mark the task cancelled. Returns `false` if it was no longer pending.
    pub(crate) fn cancel(&self) -> bool {
        if self.is_pending() {
            self.status.set(TaskStatus::Cancelled);
            true
        } else {
            false
        }
    }
}
