//! Tests for error types

use deferred_scheduler::core::{DelayKind, Lane, SchedulerError, TaskFailure};

#[test]
fn test_check_delay_passes_non_negative() {
    assert_eq!(SchedulerError::check_delay(DelayKind::Delay, 0).unwrap(), 0);
    assert_eq!(SchedulerError::check_delay(DelayKind::Delay, 250).unwrap(), 250);
}

#[test]
fn test_check_delay_rejects_negative() {
    let err = SchedulerError::check_delay(DelayKind::Interval, -5).unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::InvalidDelay {
            what: DelayKind::Interval,
            value_ms: -5
        }
    ));
    assert_eq!(err.to_string(), "invalid interval: -5ms is negative");
}

#[test]
fn test_error_display() {
    assert_eq!(SchedulerError::InboxFull.to_string(), "remote inbox full");
    assert_eq!(SchedulerError::Disconnected.to_string(), "scheduler disconnected");
    assert_eq!(
        SchedulerError::InvalidConfig("bad".into()).to_string(),
        "invalid configuration: bad"
    );
}

#[test]
fn test_task_failure_display() {
    let labelled = TaskFailure {
        task_id: 7,
        lane: Lane::Macrotask,
        label: Some("debounce"),
        error: anyhow::anyhow!("boom"),
    };
    assert_eq!(labelled.to_string(), "macrotask task 7 (debounce) failed: boom");

    let bare = TaskFailure {
        task_id: 3,
        lane: Lane::Microtask,
        label: None,
        error: anyhow::anyhow!("boom"),
    };
    assert_eq!(bare.to_string(), "microtask task 3 failed: boom");
}

#[test]
fn test_callable_failure_is_transparent() {
    let failure = TaskFailure {
        task_id: 1,
        lane: Lane::Inline,
        label: None,
        error: anyhow::anyhow!("nope"),
    };
    let err: SchedulerError = failure.into();
    assert!(matches!(err, SchedulerError::CallableFailure(_)));
    assert_eq!(err.to_string(), "inline task 1 failed: nope");
}
