//! Single-threaded cooperative scheduler with a microtask FIFO and a timer heap.
//!
//! The loop drains microtasks to empty, then runs at most one ready macrotask,
//! then drains microtasks again, and so on. Every task runs to completion.
//! A task that fails or panics is reported to the error handler and the loop
//! moves on.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::error::{DelayKind, SchedulerError, TaskFailure};
use crate::core::task::{CancelHandle, Lane, Task, TaskFn, TaskId, TaskResult, TaskStatus};
use crate::infra::queue::{MicrotaskQueue, TimerQueue};
use crate::runtime::remote::{Inbox, RemoteHandle, RemoteMessage, DEFAULT_INBOX_CAPACITY};
use crate::util::clock::{Clock, ManualClock, Millis, MonotonicClock};

/// Callback receiving every task failure.
pub type ErrorHandler = Box<dyn FnMut(&TaskFailure)>;

/// Counters describing scheduler activity since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Microtasks queued.
    pub microtasks_scheduled: u64,
    /// Macrotasks queued.
    pub macrotasks_scheduled: u64,
    /// Microtasks executed.
    pub microtasks_run: u64,
    /// Macrotasks executed.
    pub macrotasks_run: u64,
    /// Policy executions run inline.
    pub inline_run: u64,
    /// Executions that returned an error or panicked.
    pub failed: u64,
    /// Pending tasks cancelled.
    pub cancelled: u64,
    /// Cancelled tasks discarded by the loop.
    pub skipped: u64,
}

#[derive(Debug, Clone, Copy)]
enum Drive {
    Idle,
    Until(Millis),
    Forever,
}

struct Inner {
    id: Uuid,
    clock: Rc<dyn Clock>,
    microtasks: RefCell<MicrotaskQueue>,
    timers: RefCell<TimerQueue>,
    next_id: Cell<TaskId>,
    stop_requested: Cell<bool>,
    stats: Cell<SchedulerStats>,
    error_handler: RefCell<Option<ErrorHandler>>,
    // failures raised while the handler is running wait here
    undelivered: RefCell<VecDeque<TaskFailure>>,
    reporting: Cell<bool>,
    audit: RefCell<Option<Box<dyn AuditSink>>>,
    inbox: Inbox,
}

/// Deferred execution scheduler.
///
/// Cheap to clone: clones are handles onto the same queues, which lets a task
/// capture the scheduler and enqueue follow-up work. Not `Send`; other threads
/// go through [`Scheduler::remote`].
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<Inner>,
}

impl Scheduler {
    /// Create a scheduler driven by `clock`.
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self::with_parts(Rc::new(clock), DEFAULT_INBOX_CAPACITY)
    }

    /// Scheduler on a fresh [`ManualClock`] starting at zero.
    #[must_use]
    pub fn manual() -> Self {
        Self::new(ManualClock::new())
    }

    /// Scheduler on a [`MonotonicClock`] starting now.
    #[must_use]
    pub fn monotonic() -> Self {
        Self::new(MonotonicClock::new())
    }

    pub(crate) fn with_parts(clock: Rc<dyn Clock>, inbox_capacity: usize) -> Self {
        let id = Uuid::new_v4();
        debug!(scheduler_id = %id, inbox_capacity, "scheduler created");
        Self {
            inner: Rc::new(Inner {
                id,
                clock,
                microtasks: RefCell::new(MicrotaskQueue::new()),
                timers: RefCell::new(TimerQueue::new()),
                next_id: Cell::new(0),
                stop_requested: Cell::new(false),
                stats: Cell::new(SchedulerStats::default()),
                error_handler: RefCell::new(None),
                undelivered: RefCell::new(VecDeque::new()),
                reporting: Cell::new(false),
                audit: RefCell::new(None),
                inbox: Inbox::new(inbox_capacity),
            }),
        }
    }

    /// Instance identifier used in logs and audit events.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Current reading of the scheduler's clock.
    #[must_use]
    pub fn now(&self) -> Millis {
        self.inner.clock.now()
    }

    /// The clock driving this scheduler.
    #[must_use]
    pub fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.inner.clock)
    }

    /// Register the callback that receives task failures, replacing any previous one.
    pub fn set_error_handler(&self, handler: impl FnMut(&TaskFailure) + 'static) {
        *self.inner.error_handler.borrow_mut() = Some(Box::new(handler));
    }

    /// Attach an audit sink recording every task lifecycle step.
    pub fn set_audit_sink(&self, sink: impl AuditSink + 'static) {
        *self.inner.audit.borrow_mut() = Some(Box::new(sink));
    }

    /// Handle for submitting work from other threads.
    #[must_use]
    pub fn remote(&self) -> RemoteHandle {
        self.inner.inbox.handle(self.inner.id)
    }

    /// Append a microtask. It runs before any further macrotask.
    pub fn schedule_microtask<F>(&self, f: F)
    where
        F: FnOnce() -> TaskResult + 'static,
    {
        self.enqueue_microtask(None, Box::new(f));
    }

    /// Queue a macrotask ready `delay_ms` from now.
    ///
    /// # Errors
    ///
    /// `InvalidDelay` when `delay_ms` is negative.
    pub fn schedule_macrotask<F>(&self, f: F, delay_ms: i64) -> Result<CancelHandle, SchedulerError>
    where
        F: FnOnce() -> TaskResult + 'static,
    {
        let delay = SchedulerError::check_delay(DelayKind::Delay, delay_ms)?;
        Ok(self.enqueue_timer(None, Box::new(f), delay))
    }

    /// Cancel a pending task. No-op if it already ran, failed or was cancelled.
    pub fn cancel(&self, handle: &CancelHandle) {
        if handle.cancel() {
            self.bump(|s| s.cancelled += 1);
            self.audit(handle.id(), handle.lane(), None, AuditAction::Cancelled);
            debug!(scheduler_id = %self.inner.id, task_id = handle.id(), "task cancelled");
        } else {
            trace!(
                task_id = handle.id(),
                status = ?handle.status(),
                "cancel ignored"
            );
        }
    }

    /// Run until both queues are empty, advancing a virtual clock to each
    /// ready time or waiting for a wall clock to get there.
    ///
    /// Returns early if [`Scheduler::stop`] is called.
    pub fn run_until_idle(&self) {
        self.drive(Drive::Idle);
    }

    /// Run every task ready at or before `deadline`, then leave the clock at
    /// `deadline` (virtual clocks jump, wall clocks are waited on).
    pub fn run_until(&self, deadline: Millis) {
        self.drive(Drive::Until(deadline));
    }

    /// Shorthand for `run_until(now + by)`.
    pub fn advance_by(&self, by: Millis) {
        self.run_until(self.now().saturating_add(by));
    }

    /// Run until [`Scheduler::stop`] (or [`RemoteHandle::stop`]) is observed.
    ///
    /// With nothing queued the loop blocks on the remote inbox.
    pub fn run_forever(&self) {
        self.drive(Drive::Forever);
    }

    /// Ask the running loop to return at its next boundary.
    ///
    /// A stop requested while no loop is running makes the next run return
    /// immediately.
    pub fn stop(&self) {
        debug!(scheduler_id = %self.inner.id, "stop requested");
        self.inner.stop_requested.set(true);
    }

    /// Whether no live task is queued on either lane.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending_microtasks() == 0 && self.pending_macrotasks() == 0
    }

    /// Microtasks still pending.
    #[must_use]
    pub fn pending_microtasks(&self) -> usize {
        self.inner.microtasks.borrow().live_len()
    }

    /// Macrotasks still pending.
    #[must_use]
    pub fn pending_macrotasks(&self) -> usize {
        self.inner.timers.borrow().live_len()
    }

    /// Ready time of the earliest pending macrotask.
    #[must_use]
    pub fn next_ready_at(&self) -> Option<Millis> {
        self.inner.timers.borrow_mut().peek_ready_at()
    }

    /// Activity counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.inner.stats.get()
    }

    /// Drop cancelled timers from the heap now rather than when they surface.
    pub fn purge_cancelled(&self) -> usize {
        let removed = self.inner.timers.borrow_mut().prune_cancelled();
        if removed > 0 {
            debug!(scheduler_id = %self.inner.id, removed, "purged cancelled timers");
        }
        removed
    }

    pub(crate) fn enqueue_microtask(&self, label: Option<&'static str>, run: TaskFn) -> CancelHandle {
        let task = Task::new(self.next_id(), Lane::Microtask, label, self.now(), run);
        let handle = task.handle();
        trace!(task_id = task.id, label, "microtask queued");
        self.audit(task.id, Lane::Microtask, label, AuditAction::Enqueued);
        self.inner.microtasks.borrow_mut().push(task);
        self.bump(|s| s.microtasks_scheduled += 1);
        handle
    }

    pub(crate) fn enqueue_timer(
        &self,
        label: Option<&'static str>,
        run: TaskFn,
        delay: Millis,
    ) -> CancelHandle {
        let ready_at = self.now().saturating_add(delay);
        let task = Task::new(self.next_id(), Lane::Macrotask, label, ready_at, run);
        let handle = task.handle();
        trace!(task_id = task.id, label, ready_at, "macrotask queued");
        self.audit(task.id, Lane::Macrotask, label, AuditAction::Enqueued);
        self.inner.timers.borrow_mut().push(task);
        self.bump(|s| s.macrotasks_scheduled += 1);
        handle
    }

    /// Execute right now with the loop's failure isolation.
    pub(crate) fn run_inline(&self, label: Option<&'static str>, run: TaskFn) {
        let task = Task::new(self.next_id(), Lane::Inline, label, self.now(), run);
        self.execute(task);
    }

    fn drive(&self, mode: Drive) {
        debug!(scheduler_id = %self.inner.id, ?mode, "loop started");
        loop {
            if self.inner.stop_requested.get() {
                break;
            }
            self.pull_inbox();

            let micro = self.inner.microtasks.borrow_mut().pop();
            if let Some(task) = micro {
                self.execute(task);
                continue;
            }

            let now = self.now();
            let horizon = match mode {
                Drive::Until(deadline) => now.min(deadline),
                Drive::Idle | Drive::Forever => now,
            };
            let ready = self.inner.timers.borrow_mut().pop_ready(horizon);
            if let Some(task) = ready {
                self.execute(task);
                continue;
            }

            let next = self.next_ready_at();
            match (mode, next) {
                (Drive::Until(deadline), _) if now >= deadline => break,
                (Drive::Until(deadline), next) => {
                    self.wait_until(next.map_or(deadline, |at| at.min(deadline)));
                }
                (Drive::Idle, None) => break,
                (Drive::Forever, None) => {
                    if let Some(msg) = self.inner.inbox.recv() {
                        self.accept_remote(msg);
                    }
                }
                (Drive::Idle | Drive::Forever, Some(at)) => self.wait_until(at),
            }
        }
        self.inner.stop_requested.set(false);
        debug!(scheduler_id = %self.inner.id, now = self.now(), "loop returned");
    }

    fn wait_until(&self, deadline: Millis) {
        if self.inner.clock.advance_to(deadline) {
            return;
        }
        let now = self.now();
        if deadline <= now {
            return;
        }
        if let Some(msg) = self
            .inner
            .inbox
            .recv_timeout(Duration::from_millis(deadline - now))
        {
            self.accept_remote(msg);
        }
    }

    fn pull_inbox(&self) {
        while let Some(msg) = self.inner.inbox.try_recv() {
            self.accept_remote(msg);
        }
    }

    fn accept_remote(&self, msg: RemoteMessage) {
        match msg {
            RemoteMessage::Microtask(run) => {
                self.enqueue_microtask(Some("remote"), run);
            }
            RemoteMessage::Macrotask { run, delay_ms } => {
                self.enqueue_timer(Some("remote"), run, delay_ms);
            }
            RemoteMessage::Stop => self.stop(),
        }
    }

    fn execute(&self, task: Task) {
        let Task {
            id,
            lane,
            label,
            status,
            run,
            ..
        } = task;

        if status.get() == TaskStatus::Cancelled {
            trace!(task_id = id, %lane, "skipping cancelled task");
            self.bump(|s| s.skipped += 1);
            self.audit(id, lane, label, AuditAction::Skipped);
            return;
        }

        status.set(TaskStatus::Running);
        self.audit(id, lane, label, AuditAction::Started);
        debug!(task_id = id, %lane, label, at = self.now(), "running task");

        let outcome = panic::catch_unwind(AssertUnwindSafe(run))
            .unwrap_or_else(|payload| Err(anyhow::anyhow!("task panicked: {}", panic_message(&*payload))));

        self.bump(|s| match lane {
            Lane::Microtask => s.microtasks_run += 1,
            Lane::Macrotask => s.macrotasks_run += 1,
            Lane::Inline => s.inline_run += 1,
        });

        match outcome {
            Ok(()) => {
                status.set(TaskStatus::Completed);
                self.audit(id, lane, label, AuditAction::Completed);
            }
            Err(error) => {
                status.set(TaskStatus::Failed);
                self.bump(|s| s.failed += 1);
                self.audit(id, lane, label, AuditAction::Failed);
                self.report_failure(TaskFailure {
                    task_id: id,
                    lane,
                    label,
                    error,
                });
            }
        }
    }

    fn report_failure(&self, failure: TaskFailure) {
        error!(scheduler_id = %self.inner.id, task_id = failure.task_id, "{failure}");
        self.inner.undelivered.borrow_mut().push_back(failure);
        if self.inner.reporting.replace(true) {
            // Delivered by the outer call once the handler returns
            return;
        }
        loop {
            let next = self.inner.undelivered.borrow_mut().pop_front();
            let Some(failure) = next else {
                break;
            };
            // Taken out while it runs so the handler may replace itself.
            let handler = self.inner.error_handler.borrow_mut().take();
            if let Some(mut handler) = handler {
                handler(&failure);
                let mut slot = self.inner.error_handler.borrow_mut();
                if slot.is_none() {
                    *slot = Some(handler);
                }
            }
        }
        self.inner.reporting.set(false);
    }

    fn audit(&self, task_id: TaskId, lane: Lane, label: Option<&str>, action: AuditAction) {
        if let Some(sink) = self.inner.audit.borrow_mut().as_mut() {
            sink.record(build_audit_event(
                self.inner.id.to_string(),
                task_id,
                lane,
                action,
                label,
                self.now(),
            ));
        }
    }

    fn next_id(&self) -> TaskId {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        id
    }

    fn bump(&self, update: impl FnOnce(&mut SchedulerStats)) {
        let mut stats = self.inner.stats.get();
        update(&mut stats);
        self.inner.stats.set(stats);
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("id", &self.inner.id)
            .field("now", &self.now())
            .field("microtasks", &self.inner.microtasks.borrow().len())
            .field("timers", &self.inner.timers.borrow().len())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}
