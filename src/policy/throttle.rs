//! Throttle: execute at most once per interval, delivering the latest
//! arguments of a burst on a trailing execution.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::trace;

use super::{call_now, callback, invoke_callback, is_busy, Callback};
use crate::config::ThrottleConfig;
use crate::core::error::{DelayKind, SchedulerError};
use crate::core::scheduler::Scheduler;
use crate::core::task::{CancelHandle, TaskResult};
use crate::util::clock::Millis;

const LABEL: &str = "throttle";

struct ThrottleState<A> {
    last_run_at: Option<Millis>,
    pending_args: Option<A>,
    timer: Option<CancelHandle>,
}

struct Shared<A> {
    scheduler: Scheduler,
    interval: Millis,
    leading: bool,
    trailing: bool,
    state: RefCell<ThrottleState<A>>,
    callback: Callback<A>,
}

impl<A: 'static> Shared<A> {
    /// Park `args` behind a microtask in the task slot. Used when an
    /// immediate execution finds the callback already running.
    fn defer(self: &Rc<Self>, state: &mut ThrottleState<A>, args: A) {
        state.pending_args = Some(args);
        let weak = Rc::downgrade(self);
        state.timer = Some(
            self.scheduler
                .enqueue_microtask(Some(LABEL), Box::new(move || fire(&weak))),
        );
    }
}

/// Throttle controller for a callable taking `A`.
///
/// Dropping it cancels any pending trailing execution.
pub struct Throttler<A: 'static> {
    shared: Rc<Shared<A>>,
}

impl<A: 'static> Throttler<A> {
    /// Wrap `f` so it runs at most once per `interval_ms`.
    ///
    /// With `leading` the first call of a burst runs immediately; without it
    /// the burst's first execution happens one interval later. `trailing`
    /// controls whether calls inside the window are delivered afterwards.
    ///
    /// # Errors
    ///
    /// `InvalidDelay` for a negative interval, `InvalidConfig` when both
    /// edges are disabled.
    pub fn new<F>(
        scheduler: &Scheduler,
        f: F,
        interval_ms: i64,
        leading: bool,
        trailing: bool,
    ) -> Result<Self, SchedulerError>
    where
        F: FnMut(A) -> TaskResult + 'static,
    {
        let interval = SchedulerError::check_delay(DelayKind::Interval, interval_ms)?;
        if !leading && !trailing {
            return Err(SchedulerError::InvalidConfig(
                "throttle needs a leading or a trailing edge".into(),
            ));
        }
        Ok(Self {
            shared: Rc::new(Shared {
                scheduler: scheduler.clone(),
                interval,
                leading,
                trailing,
                state: RefCell::new(ThrottleState {
                    last_run_at: None,
                    pending_args: None,
                    timer: None,
                }),
                callback: callback(f),
            }),
        })
    }

    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Same as [`Throttler::new`].
    pub fn from_config<F>(scheduler: &Scheduler, config: &ThrottleConfig, f: F) -> Result<Self, SchedulerError>
    where
        F: FnMut(A) -> TaskResult + 'static,
    {
        Self::new(scheduler, f, config.interval_ms, config.leading, config.trailing)
    }

    /// Record a trigger event carrying `args`.
    pub fn invoke(&self, args: A) {
        let shared = &self.shared;
        let now = shared.scheduler.now();
        let mut state = shared.state.borrow_mut();
        let elapsed = state.last_run_at.map(|last| now.saturating_sub(last));
        let window_open = elapsed.is_none_or(|e| e >= shared.interval);

        if window_open && shared.leading {
            // Runs now with the newest args, superseding an unfired trailing call
            if let Some(timer) = state.timer.take() {
                shared.scheduler.cancel(&timer);
            }
            state.last_run_at = Some(now);
            if is_busy(&shared.callback) {
                shared.defer(&mut state, args);
                return;
            }
            state.pending_args = None;
            drop(state);
            call_now(&shared.scheduler, LABEL, &shared.callback, args);
            return;
        }

        if !shared.trailing {
            trace!(now, "throttle: call inside window dropped");
            return;
        }

        state.pending_args = Some(args);
        if state.timer.is_none() {
            let delay = match elapsed {
                Some(e) if !window_open => shared.interval - e,
                _ => shared.interval,
            };
            let weak = Rc::downgrade(shared);
            state.timer = Some(
                shared
                    .scheduler
                    .enqueue_timer(Some(LABEL), Box::new(move || fire(&weak)), delay),
            );
        }
    }

    /// Discard the pending trailing call and forget the last execution time.
    pub fn cancel(&self) {
        let mut state = self.shared.state.borrow_mut();
        if let Some(timer) = state.timer.take() {
            self.shared.scheduler.cancel(&timer);
        }
        state.pending_args = None;
        state.last_run_at = None;
    }

    /// Deliver the pending trailing call now.
    ///
    /// Called from inside the callback, the delivery is deferred to the next
    /// microtask instead.
    pub fn flush(&self) {
        let shared = &self.shared;
        let mut state = shared.state.borrow_mut();
        if let Some(timer) = state.timer.take() {
            shared.scheduler.cancel(&timer);
        }
        let Some(args) = state.pending_args.take() else {
            return;
        };
        state.last_run_at = Some(shared.scheduler.now());
        if is_busy(&shared.callback) {
            shared.defer(&mut state, args);
            return;
        }
        drop(state);
        call_now(&shared.scheduler, LABEL, &shared.callback, args);
    }

    /// Whether a trailing or deferred execution is scheduled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.shared
            .state
            .borrow()
            .timer
            .as_ref()
            .is_some_and(CancelHandle::is_pending)
    }

    /// Clock reading at the most recent execution.
    #[must_use]
    pub fn last_run_at(&self) -> Option<Millis> {
        self.shared.state.borrow().last_run_at
    }

    /// Configured interval.
    #[must_use]
    pub fn interval(&self) -> Millis {
        self.shared.interval
    }
}

impl<A: 'static> Drop for Throttler<A> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.shared.state.try_borrow_mut() {
            if let Some(timer) = state.timer.take() {
                self.shared.scheduler.cancel(&timer);
            }
        }
    }
}

fn fire<A: 'static>(weak: &Weak<Shared<A>>) -> TaskResult {
    let Some(shared) = weak.upgrade() else {
        return Ok(());
    };
    let args = {
        let mut state = shared.state.borrow_mut();
        state.timer = None;
        let args = state.pending_args.take();
        if args.is_some() {
            state.last_run_at = Some(shared.scheduler.now());
        }
        args
    };
    match args {
        Some(args) => invoke_callback(&shared.callback, args),
        None => Ok(()),
    }
}

impl Scheduler {
    /// Wrap `f` in a [`Throttler`] with a trailing edge.
    ///
    /// # Errors
    ///
    /// `InvalidDelay` for a negative interval.
    pub fn throttle<A, F>(&self, f: F, interval_ms: i64, leading: bool) -> Result<Throttler<A>, SchedulerError>
    where
        A: 'static,
        F: FnMut(A) -> TaskResult + 'static,
    {
        Throttler::new(self, f, interval_ms, leading, true)
    }
}
