//! Rate-limiting policies wrapping a callable: debounce and throttle.
//!
//! Each controller owns its state and holds the scheduler it enqueues on.
//! Tasks it schedules only keep a weak reference back, so dropping the
//! controller releases everything and cancels what is pending. An immediate
//! execution requested while the callback is already running is parked in
//! the controller's single task slot as a microtask.

pub mod debounce;
pub mod throttle;

pub use debounce::{DebounceEdge, Debouncer};
pub use throttle::Throttler;

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::scheduler::Scheduler;
use crate::core::task::TaskResult;

/// Wrapped callable shared between a controller and the tasks it schedules.
type Callback<A> = Rc<RefCell<Box<dyn FnMut(A) -> TaskResult>>>;

fn callback<A, F>(f: F) -> Callback<A>
where
    F: FnMut(A) -> TaskResult + 'static,
{
    Rc::new(RefCell::new(Box::new(f)))
}

fn invoke_callback<A>(callback: &Callback<A>, args: A) -> TaskResult {
    let mut f = callback
        .try_borrow_mut()
        .map_err(|_| anyhow::anyhow!("rate-limited callback re-entered while running"))?;
    (&mut **f)(args)
}

fn is_busy<A>(callback: &Callback<A>) -> bool {
    callback.try_borrow_mut().is_err()
}

/// Execute now through the scheduler's failure isolation. Callers check
/// `is_busy` first and defer through their own state when it is.
fn call_now<A: 'static>(scheduler: &Scheduler, label: &'static str, callback: &Callback<A>, args: A) {
    let callback = Rc::clone(callback);
    scheduler.run_inline(Some(label), Box::new(move || invoke_callback(&callback, args)));
}
