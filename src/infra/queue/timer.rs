//! In-memory timer queue ordered by ready time, then insertion order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::task::{Task, TaskStatus};
use crate::util::clock::Millis;

/// Wrapper to make a Task orderable by (ready time, id) ascending on a max-heap.
struct TimerEntry {
    task: Task,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.task.id == other.task.id
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earliest ready time first, then lowest id (reversed for max-heap)
        other
            .task
            .ready_at
            .cmp(&self.task.ready_at)
            .then_with(|| other.task.id.cmp(&self.task.id))
    }
}

/// Priority collection of macrotasks.
///
/// O(log n) insertion and removal. Cancelled entries are dropped lazily when
/// they reach the head, or eagerly through [`TimerQueue::prune_cancelled`].
#[derive(Default)]
pub struct TimerQueue {
    heap: BinaryHeap<TimerEntry>,
}

impl TimerQueue {
    /// Create an empty timer queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    /// Insert a task keyed by its ready time.
    pub fn push(&mut self, task: Task) {
        self.heap.push(TimerEntry { task });
    }

    /// Ready time of the earliest live task, discarding cancelled heads.
    pub fn peek_ready_at(&mut self) -> Option<Millis> {
        while let Some(head) = self.heap.peek() {
            if head.task.is_cancelled() {
                self.heap.pop();
                continue;
            }
            return Some(head.task.ready_at);
        }
        None
    }

    /// Pop the earliest live task if its ready time is at or before `now`.
    pub fn pop_ready(&mut self, now: Millis) -> Option<Task> {
        match self.peek_ready_at() {
            Some(ready_at) if ready_at <= now => self.heap.pop().map(|e| e.task),
            _ => None,
        }
    }

    /// Remove every cancelled entry and return how many were dropped.
    pub fn prune_cancelled(&mut self) -> usize {
        let before = self.heap.len();
        self.heap.retain(|e| !e.task.is_cancelled());
        before.saturating_sub(self.heap.len())
    }

    /// Raw length, cancelled entries included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether nothing is queued, cancelled entries included.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of queued tasks still pending.
    #[must_use]
    pub fn live_len(&self) -> usize {
        self.heap
            .iter()
            .filter(|e| e.task.status.get() == TaskStatus::Pending)
            .count()
    }
}

impl std::fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerQueue")
            .field("len", &self.heap.len())
            .finish()
    }
}
