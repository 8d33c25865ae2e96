//! Strict FIFO queue for microtasks.

use std::collections::VecDeque;

use crate::core::task::{Task, TaskStatus};

/// Unbounded FIFO of microtasks.
///
/// Cancelled tasks stay in place and are skipped by the loop when popped.
#[derive(Debug, Default)]
pub struct MicrotaskQueue {
    tasks: VecDeque<Task>,
}

impl MicrotaskQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
        }
    }

    /// Append to the back.
    pub fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    /// Take the front task.
    pub fn pop(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    /// Raw length, cancelled entries included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether nothing is queued, cancelled entries included.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of queued tasks still pending.
    #[must_use]
    pub fn live_len(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status.get() == TaskStatus::Pending)
            .count()
    }
}
