//! Audit sink implementations.
//!
//! Records the lifecycle of every task the scheduler touches, so a host can
//! reconstruct ordering after the fact.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::task::{Lane, TaskId};
use crate::util::clock::Millis;

/// Lifecycle step recorded for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Task was queued.
    Enqueued,
    /// Task started executing.
    Started,
    /// Task finished successfully.
    Completed,
    /// Task returned an error or panicked.
    Failed,
    /// Task was cancelled while pending.
    Cancelled,
    /// Loop popped a cancelled task and dropped it.
    Skipped,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Enqueued => "enqueued",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// Audit event structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Scheduler instance identifier.
    pub scheduler_id: String,
    /// Related task identifier.
    pub task_id: TaskId,
    /// Lane the task belongs to.
    pub lane: Lane,
    /// Action taken.
    pub action: AuditAction,
    /// Optional task label.
    pub label: Option<String>,
    /// Scheduler clock reading when recorded.
    pub at_ms: Millis,
}

/// Audit sink abstraction.
///
/// `Send` so a sink can hand events to a collector on another thread while
/// the scheduler owning it stays on its own.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

impl AuditSink for Box<dyn AuditSink> {
    fn record(&mut self, event: AuditEvent) {
        (**self).record(event);
    }
}

/// In-memory audit sink for testing and dev.
///
/// Clones share one bounded buffer, so a caller can keep a clone to inspect
/// what the scheduler recorded through its own copy.
#[derive(Clone)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<VecDeque<AuditEvent>>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(1024)))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Snapshot of actions recorded for one task, in order.
    #[must_use]
    pub fn actions_for(&self, task_id: TaskId) -> Vec<AuditAction> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.task_id == task_id)
            .map(|e| e.action)
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Helper to build an audit event from context.
pub fn build_audit_event(
    scheduler_id: impl Into<String>,
    task_id: TaskId,
    lane: Lane,
    action: AuditAction,
    label: Option<&str>,
    at_ms: Millis,
) -> AuditEvent {
    AuditEvent {
        scheduler_id: scheduler_id.into(),
        task_id,
        lane,
        action,
        label: label.map(str::to_owned),
        at_ms,
    }
}
