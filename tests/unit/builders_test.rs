//! Tests for builders

use std::cell::RefCell;
use std::rc::Rc;

use deferred_scheduler::builders::SchedulerBuilder;
use deferred_scheduler::config::{ClockConfig, SchedulerConfig};
use deferred_scheduler::core::{AuditAction, InMemoryAuditSink, SchedulerError};
use deferred_scheduler::util::ManualClock;

#[test]
fn test_builder_uses_configured_manual_clock() {
    let cfg = SchedulerConfig {
        clock: ClockConfig::Manual { start_ms: 300 },
        ..SchedulerConfig::default()
    };
    let scheduler = SchedulerBuilder::from_config(cfg).build().unwrap();
    assert_eq!(scheduler.now(), 300);

    scheduler.schedule_macrotask(|| Ok(()), 50).unwrap();
    scheduler.run_until_idle();
    assert_eq!(scheduler.now(), 350);
}

#[test]
fn test_explicit_clock_overrides_config() {
    let clock = ManualClock::starting_at(7);
    let scheduler = SchedulerBuilder::new().with_clock(clock.clone()).build().unwrap();
    clock.advance(3);
    assert_eq!(scheduler.now(), 10);
}

#[test]
fn test_invalid_config_rejected() {
    let cfg = SchedulerConfig {
        inbox_capacity: 0,
        ..SchedulerConfig::default()
    };
    let result = SchedulerBuilder::from_config(cfg).build();
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}

#[test]
fn test_builder_installs_error_handler() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    let scheduler = SchedulerBuilder::new()
        .with_clock(ManualClock::new())
        .with_error_handler(move |failure| log.borrow_mut().push(failure.task_id))
        .build()
        .unwrap();

    let handle = scheduler
        .schedule_macrotask(|| Err(anyhow::anyhow!("bad")), 0)
        .unwrap();
    scheduler.run_until_idle();
    assert_eq!(*seen.borrow(), vec![handle.id()]);
}

#[test]
fn test_builder_attaches_audit_sink() {
    let sink = InMemoryAuditSink::new(16);
    let scheduler = SchedulerBuilder::new()
        .with_clock(ManualClock::new())
        .with_audit(sink.clone())
        .build()
        .unwrap();

    let handle = scheduler.schedule_macrotask(|| Ok(()), 5).unwrap();
    scheduler.run_until_idle();
    assert_eq!(
        sink.actions_for(handle.id()),
        vec![AuditAction::Enqueued, AuditAction::Started, AuditAction::Completed]
    );
}
