//! Debounce: collapse a burst of invocations into one execution after a
//! quiet period.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{call_now, callback, invoke_callback, is_busy, Callback};
use crate::config::DebounceConfig;
use crate::core::error::{DelayKind, SchedulerError};
use crate::core::scheduler::Scheduler;
use crate::core::task::{CancelHandle, TaskResult};
use crate::util::clock::Millis;

const LABEL: &str = "debounce";

/// Which edge of a burst executes the callable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebounceEdge {
    /// Execute on the first invocation, then ignore the rest of the burst.
    Leading,
    /// Execute once after the burst goes quiet, with the last arguments.
    #[default]
    Trailing,
    /// Leading execution plus one trailing catch-up if the burst continued.
    Both,
}

struct DebounceState<A> {
    timer: Option<CancelHandle>,
    trailing_args: Option<A>,
    // leading call parked behind a microtask while the callback was running
    leading_args: Option<A>,
    last_call_at: Option<Millis>,
    burst_started_at: Option<Millis>,
}

struct Shared<A> {
    scheduler: Scheduler,
    quiet_period: Millis,
    // zero or negative quiet period: run on the next microtask
    immediate: bool,
    max_wait: Cell<Option<Millis>>,
    edge: DebounceEdge,
    state: RefCell<DebounceState<A>>,
    callback: Callback<A>,
}

impl<A: 'static> Shared<A> {
    fn next_delay(&self, now: Millis, burst_started_at: Millis) -> Millis {
        self.max_wait.get().map_or(self.quiet_period, |max_wait| {
            let deadline = burst_started_at.saturating_add(max_wait);
            self.quiet_period.min(deadline.saturating_sub(now))
        })
    }

    fn arm_timer(self: &Rc<Self>, state: &mut DebounceState<A>, delay: Millis) {
        let weak = Rc::downgrade(self);
        state.timer = Some(
            self.scheduler
                .enqueue_timer(Some(LABEL), Box::new(move || fire(&weak)), delay),
        );
    }

    fn arm_microtask(self: &Rc<Self>, state: &mut DebounceState<A>, run: fn(&Weak<Self>) -> TaskResult) {
        let weak = Rc::downgrade(self);
        state.timer = Some(
            self.scheduler
                .enqueue_microtask(Some(LABEL), Box::new(move || run(&weak))),
        );
    }
}

/// Debounce controller for a callable taking `A`.
///
/// Dropping it cancels any pending execution.
pub struct Debouncer<A: 'static> {
    shared: Rc<Shared<A>>,
}

impl<A: 'static> Debouncer<A> {
    /// Wrap `f`. A zero or negative quiet period degenerates to execution on
    /// the next microtask, still collapsing invocations made before it runs.
    pub fn new<F>(scheduler: &Scheduler, f: F, quiet_period_ms: i64, edge: DebounceEdge) -> Self
    where
        F: FnMut(A) -> TaskResult + 'static,
    {
        Self {
            shared: Rc::new(Shared {
                scheduler: scheduler.clone(),
                quiet_period: u64::try_from(quiet_period_ms).unwrap_or(0),
                immediate: quiet_period_ms <= 0,
                max_wait: Cell::new(None),
                edge,
                state: RefCell::new(DebounceState {
                    timer: None,
                    trailing_args: None,
                    leading_args: None,
                    last_call_at: None,
                    burst_started_at: None,
                }),
                callback: callback(f),
            }),
        }
    }

    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// `InvalidDelay` when `max_wait_ms` is negative.
    pub fn from_config<F>(scheduler: &Scheduler, config: &DebounceConfig, f: F) -> Result<Self, SchedulerError>
    where
        F: FnMut(A) -> TaskResult + 'static,
    {
        let debouncer = Self::new(scheduler, f, config.quiet_period_ms, config.edge);
        match config.max_wait_ms {
            Some(max_wait_ms) => debouncer.with_max_wait(max_wait_ms),
            None => Ok(debouncer),
        }
    }

    /// Cap how long a continuous burst can postpone the timer, measured from
    /// the burst's first invocation. Values below the quiet period are raised
    /// to it.
    ///
    /// # Errors
    ///
    /// `InvalidDelay` when `max_wait_ms` is negative.
    pub fn with_max_wait(self, max_wait_ms: i64) -> Result<Self, SchedulerError> {
        let max_wait = SchedulerError::check_delay(DelayKind::MaxWait, max_wait_ms)?;
        self.shared
            .max_wait
            .set(Some(max_wait.max(self.shared.quiet_period)));
        Ok(self)
    }

    /// Record a trigger event carrying `args`.
    pub fn invoke(&self, args: A) {
        let shared = &self.shared;
        let now = shared.scheduler.now();
        let mut state = shared.state.borrow_mut();
        state.last_call_at = Some(now);

        if shared.immediate {
            state.trailing_args = Some(args);
            if state.timer.is_none() {
                shared.arm_microtask(&mut state, fire);
            }
            return;
        }

        let burst_started_at = *state.burst_started_at.get_or_insert(now);
        let leading_parked = state.leading_args.is_some();
        let idle = state.timer.is_none();
        let leading_args = match shared.edge {
            DebounceEdge::Leading | DebounceEdge::Both if idle => Some(args),
            DebounceEdge::Leading => {
                trace!(now, "debounce: leading cooldown active, invocation absorbed");
                None
            }
            DebounceEdge::Trailing | DebounceEdge::Both => {
                state.trailing_args = Some(args);
                None
            }
        };

        // The parked leading call re-arms the cooldown when it runs
        if leading_parked {
            return;
        }

        if let Some(timer) = state.timer.take() {
            shared.scheduler.cancel(&timer);
        }
        match leading_args {
            Some(args) if is_busy(&shared.callback) => {
                state.leading_args = Some(args);
                shared.arm_microtask(&mut state, fire_leading);
            }
            leading_args => {
                let delay = shared.next_delay(now, burst_started_at);
                shared.arm_timer(&mut state, delay);
                drop(state);
                if let Some(args) = leading_args {
                    call_now(&shared.scheduler, LABEL, &shared.callback, args);
                }
            }
        }
    }

    /// Discard any pending execution. The next invocation starts a new burst.
    pub fn cancel(&self) {
        let mut state = self.shared.state.borrow_mut();
        if let Some(timer) = state.timer.take() {
            self.shared.scheduler.cancel(&timer);
        }
        state.trailing_args = None;
        state.leading_args = None;
        state.burst_started_at = None;
    }

    /// Run the most recent recorded call now instead of waiting for its task.
    ///
    /// Called from inside the callback, it runs on the next microtask instead.
    pub fn flush(&self) {
        let shared = &self.shared;
        let mut state = shared.state.borrow_mut();
        if let Some(timer) = state.timer.take() {
            shared.scheduler.cancel(&timer);
        }
        state.burst_started_at = None;
        let parked = state.leading_args.take();
        let Some(args) = state.trailing_args.take().or(parked) else {
            return;
        };
        if is_busy(&shared.callback) {
            state.trailing_args = Some(args);
            shared.arm_microtask(&mut state, fire);
            return;
        }
        drop(state);
        call_now(&shared.scheduler, LABEL, &shared.callback, args);
    }

    /// Whether a timer or deferred microtask is outstanding.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.shared
            .state
            .borrow()
            .timer
            .as_ref()
            .is_some_and(CancelHandle::is_pending)
    }

    /// Clock reading at the most recent invocation.
    #[must_use]
    pub fn last_call_at(&self) -> Option<Millis> {
        self.shared.state.borrow().last_call_at
    }

    /// Configured edge.
    #[must_use]
    pub fn edge(&self) -> DebounceEdge {
        self.shared.edge
    }
}

impl<A: 'static> Drop for Debouncer<A> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.shared.state.try_borrow_mut() {
            if let Some(timer) = state.timer.take() {
                self.shared.scheduler.cancel(&timer);
            }
        }
    }
}

fn fire_leading<A: 'static>(weak: &Weak<Shared<A>>) -> TaskResult {
    let Some(shared) = weak.upgrade() else {
        return Ok(());
    };
    let args = {
        let mut state = shared.state.borrow_mut();
        let now = shared.scheduler.now();
        let burst_started_at = *state.burst_started_at.get_or_insert(now);
        let delay = shared.next_delay(now, burst_started_at);
        shared.arm_timer(&mut state, delay);
        state.leading_args.take()
    };
    match args {
        Some(args) => invoke_callback(&shared.callback, args),
        None => Ok(()),
    }
}

fn fire<A: 'static>(weak: &Weak<Shared<A>>) -> TaskResult {
    let Some(shared) = weak.upgrade() else {
        return Ok(());
    };
    let args = {
        let mut state = shared.state.borrow_mut();
        state.timer = None;
        state.burst_started_at = None;
        state.trailing_args.take()
    };
    match args {
        Some(args) => invoke_callback(&shared.callback, args),
        None => Ok(()),
    }
}

impl Scheduler {
    /// Wrap `f` in a [`Debouncer`] with the given quiet period and edge.
    pub fn debounce<A, F>(&self, f: F, quiet_period_ms: i64, edge: DebounceEdge) -> Debouncer<A>
    where
        A: 'static,
        F: FnMut(A) -> TaskResult + 'static,
    {
        Debouncer::new(self, f, quiet_period_ms, edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(scheduler: &Scheduler, edge: DebounceEdge, quiet: i64) -> (Debouncer<u32>, Rc<RefCell<Vec<(Millis, u32)>>>) {
        let fired = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&fired);
        let clock = scheduler.clone();
        let debouncer = scheduler.debounce(
            move |v: u32| {
                log.borrow_mut().push((clock.now(), v));
                Ok(())
            },
            quiet,
            edge,
        );
        (debouncer, fired)
    }

    #[test]
    fn test_max_wait_bounds_a_continuous_burst() {
        let scheduler = Scheduler::manual();
        let (debouncer, fired) = recording(&scheduler, DebounceEdge::Trailing, 100);
        let debouncer = debouncer.with_max_wait(250).unwrap();

        for t in (0..=400).step_by(50) {
            scheduler.run_until(t);
            debouncer.invoke(u32::try_from(t).unwrap());
        }
        scheduler.run_until_idle();

        // Calls every 50ms never leave a quiet gap; max wait forces the timer
        // at 250 (args from t=200), then the second burst settles 100ms after
        // its last call.
        assert_eq!(*fired.borrow(), vec![(250, 200), (500, 400)]);
    }

    #[test]
    fn test_max_wait_below_quiet_period_is_raised() {
        let scheduler = Scheduler::manual();
        let (debouncer, _) = recording(&scheduler, DebounceEdge::Trailing, 100);
        let debouncer = debouncer.with_max_wait(10).unwrap();
        assert_eq!(debouncer.shared.max_wait.get(), Some(100));
    }

    #[test]
    fn test_negative_max_wait_rejected() {
        let scheduler = Scheduler::manual();
        let (debouncer, _) = recording(&scheduler, DebounceEdge::Trailing, 100);
        assert!(matches!(
            debouncer.with_max_wait(-1),
            Err(SchedulerError::InvalidDelay {
                what: DelayKind::MaxWait,
                value_ms: -1
            })
        ));
    }

    #[test]
    fn test_drop_cancels_pending_timer() {
        let scheduler = Scheduler::manual();
        let (debouncer, fired) = recording(&scheduler, DebounceEdge::Trailing, 100);
        debouncer.invoke(1);
        assert_eq!(scheduler.pending_macrotasks(), 1);

        drop(debouncer);
        assert_eq!(scheduler.pending_macrotasks(), 0);
        scheduler.run_until_idle();
        assert!(fired.borrow().is_empty());
    }
}
