//! Tests for clocks

use deferred_scheduler::core::Scheduler;
use deferred_scheduler::util::{Clock, ManualClock};

#[test]
fn test_manual_clock_drives_scheduler_time() {
    let clock = ManualClock::starting_at(1_000);
    let scheduler = Scheduler::new(clock.clone());
    assert_eq!(scheduler.now(), 1_000);

    clock.advance(250);
    assert_eq!(scheduler.now(), 1_250);
}

#[test]
fn test_idle_run_jumps_virtual_clock_to_last_timer() {
    let clock = ManualClock::new();
    let scheduler = Scheduler::new(clock.clone());
    scheduler.schedule_macrotask(|| Ok(()), 40).unwrap();
    scheduler.schedule_macrotask(|| Ok(()), 90).unwrap();

    scheduler.run_until_idle();
    assert_eq!(clock.now(), 90);
}

#[test]
fn test_advance_by_moves_clock_with_nothing_queued() {
    let scheduler = Scheduler::manual();
    scheduler.advance_by(30);
    scheduler.advance_by(20);
    assert_eq!(scheduler.now(), 50);
}
