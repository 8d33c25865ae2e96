//! Tests for audit sink

use deferred_scheduler::core::{
    build_audit_event, AuditAction, AuditSink, InMemoryAuditSink, Lane, Scheduler,
};

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);

    let event = build_audit_event("sched", 1, Lane::Macrotask, AuditAction::Enqueued, Some("timer"), 5);
    sink.record(event);

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].scheduler_id, "sched");
    assert_eq!(events[0].task_id, 1);
    assert_eq!(events[0].action, AuditAction::Enqueued);
    assert_eq!(events[0].label.as_deref(), Some("timer"));
    assert_eq!(events[0].at_ms, 5);
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);

    sink.record(build_audit_event("s", 1, Lane::Microtask, AuditAction::Enqueued, None, 0));
    sink.record(build_audit_event("s", 2, Lane::Microtask, AuditAction::Enqueued, None, 0));
    sink.record(build_audit_event("s", 3, Lane::Microtask, AuditAction::Enqueued, None, 0));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].task_id, 2); // First one popped
    assert_eq!(events[1].task_id, 3);
}

#[test]
fn test_zero_capacity_records_nothing() {
    let mut sink = InMemoryAuditSink::new(0);
    sink.record(build_audit_event("s", 1, Lane::Inline, AuditAction::Started, None, 0));
    assert!(sink.events().is_empty());
}

#[test]
fn test_scheduler_records_lifecycle() {
    let scheduler = Scheduler::manual();
    let sink = InMemoryAuditSink::new(64);
    scheduler.set_audit_sink(sink.clone());

    let ok = scheduler.schedule_macrotask(|| Ok(()), 10).unwrap();
    let failing = scheduler
        .schedule_macrotask(|| Err(anyhow::anyhow!("bad")), 20)
        .unwrap();
    let dropped = scheduler.schedule_macrotask(|| Ok(()), 5).unwrap();
    scheduler.cancel(&dropped);
    scheduler.run_until_idle();

    assert_eq!(
        sink.actions_for(ok.id()),
        vec![AuditAction::Enqueued, AuditAction::Started, AuditAction::Completed]
    );
    assert_eq!(
        sink.actions_for(failing.id()),
        vec![AuditAction::Enqueued, AuditAction::Started, AuditAction::Failed]
    );
    assert_eq!(
        sink.actions_for(dropped.id()),
        vec![AuditAction::Enqueued, AuditAction::Cancelled]
    );
    // Cancelled timers are discarded off the heap without running
    assert_eq!(scheduler.stats().cancelled, 1);

    let started = sink
        .events()
        .into_iter()
        .find(|e| e.task_id == failing.id() && e.action == AuditAction::Started)
        .unwrap();
    assert_eq!(started.at_ms, 20);
    assert_eq!(started.scheduler_id, scheduler.id().to_string());
}

#[test]
fn test_audit_event_serializes_snake_case() {
    let event = build_audit_event("s", 4, Lane::Microtask, AuditAction::Skipped, None, 12);
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["lane"], "microtask");
    assert_eq!(json["action"], "skipped");
    assert_eq!(json["at_ms"], 12);
}

#[test]
fn test_sink_clone_readable_from_another_thread() {
    let scheduler = Scheduler::manual();
    let sink = InMemoryAuditSink::new(8);
    scheduler.set_audit_sink(sink.clone());

    scheduler.schedule_microtask(|| Ok(()));
    scheduler.run_until_idle();

    let actions = std::thread::spawn(move || {
        sink.events().into_iter().map(|e| e.action).collect::<Vec<_>>()
    })
    .join()
    .unwrap();
    assert_eq!(
        actions,
        vec![AuditAction::Enqueued, AuditAction::Started, AuditAction::Completed]
    );
}
