//! Monotonic time sources for the scheduler.
//!
//! Time is measured in whole milliseconds from an arbitrary origin. The loop
//! never asks a clock for wall time; it only compares `now()` against ready
//! times it computed from the same clock.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Milliseconds since the clock's origin.
pub type Millis = u64;

/// Source of monotonic time.
///
/// `now()` must be non-decreasing across calls.
pub trait Clock {
    /// Current time in milliseconds.
    fn now(&self) -> Millis;

    /// Jump straight to `deadline` instead of waiting for it.
    ///
    /// Returns `true` when time moved (virtual clocks). Wall clocks return
    /// `false` and the loop waits for real time to pass instead.
    fn advance_to(&self, deadline: Millis) -> bool {
        let _ = deadline;
        false
    }
}

/// Wall clock backed by [`Instant`], with its origin at construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Start a clock reading zero now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Millis {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Deterministic clock that only moves when told to.
///
/// Clones share the same time cell, so a test can keep one copy while the
/// scheduler owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Millis>>,
}

impl ManualClock {
    /// Create a clock reading `start`.
    #[must_use]
    pub fn starting_at(start: Millis) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    /// Create a clock reading zero.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Set the time. Earlier values than the current reading are ignored.
    pub fn set(&self, at: Millis) {
        if at > self.now.get() {
            self.now.set(at);
        }
    }

    /// Move time forward by `by` milliseconds.
    pub fn advance(&self, by: Millis) {
        self.now.set(self.now.get().saturating_add(by));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        self.now.get()
    }

    fn advance_to(&self, deadline: Millis) -> bool {
        self.set(deadline);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_never_moves_backwards() {
        let clock = ManualClock::starting_at(50);
        clock.set(20);
        assert_eq!(clock.now(), 50);
        clock.set(80);
        assert_eq!(clock.now(), 80);
        assert!(clock.advance_to(60));
        assert_eq!(clock.now(), 80);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let view = clock.clone();
        clock.advance(15);
        assert_eq!(view.now(), 15);
    }

    #[test]
    fn monotonic_clock_is_non_decreasing() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(!clock.advance_to(a + 1_000));
    }
}
