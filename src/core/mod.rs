//! Core scheduling abstractions: tasks, the event loop, errors and auditing.

pub mod audit;
pub mod error;
pub mod scheduler;
pub mod task;

pub use audit::{build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink};
pub use error::{AppResult, DelayKind, SchedulerError, TaskFailure};
pub use scheduler::{ErrorHandler, Scheduler, SchedulerStats};
pub use task::{CancelHandle, Lane, Task, TaskId, TaskResult, TaskStatus};
