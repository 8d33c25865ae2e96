//! Tests for configuration validation

use deferred_scheduler::config::{ClockConfig, DebounceConfig, SchedulerConfig, ThrottleConfig, ENV_PREFIX};
use deferred_scheduler::policy::DebounceEdge;

#[test]
fn test_default_config_is_valid() {
    let cfg = SchedulerConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.clock, ClockConfig::Monotonic);
    assert_eq!(cfg.inbox_capacity, 1024);
    assert_eq!(cfg.debounce.edge, DebounceEdge::Trailing);
    assert!(cfg.throttle.leading && cfg.throttle.trailing);
}

#[test]
fn test_zero_inbox_capacity_rejected() {
    let cfg = SchedulerConfig {
        inbox_capacity: 0,
        ..SchedulerConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_zero_audit_capacity_rejected() {
    let cfg = SchedulerConfig {
        audit_capacity: Some(0),
        ..SchedulerConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_debounce_config_validation() {
    let zero_quiet = DebounceConfig {
        quiet_period_ms: 0,
        ..DebounceConfig::default()
    };
    assert!(zero_quiet.validate().is_ok());

    let negative_wait = DebounceConfig {
        max_wait_ms: Some(-1),
        ..DebounceConfig::default()
    };
    assert!(negative_wait.validate().is_err());
}

#[test]
fn test_throttle_config_validation() {
    let negative = ThrottleConfig {
        interval_ms: -10,
        ..ThrottleConfig::default()
    };
    assert!(negative.validate().is_err());

    let no_edges = ThrottleConfig {
        interval_ms: 100,
        leading: false,
        trailing: false,
    };
    assert!(no_edges.validate().is_err());
}

#[test]
fn test_section_errors_are_prefixed() {
    let cfg = SchedulerConfig {
        throttle: ThrottleConfig {
            interval_ms: -1,
            ..ThrottleConfig::default()
        },
        ..SchedulerConfig::default()
    };
    let err = cfg.validate().unwrap_err();
    assert!(err.starts_with("throttle invalid: "), "{err}");
}

#[test]
fn test_from_json_str_fills_defaults() {
    let cfg = SchedulerConfig::from_json_str(
        r#"{
            "clock": { "kind": "manual", "start_ms": 500 },
            "debounce": { "quiet_period_ms": 300, "edge": "both" }
        }"#,
    )
    .unwrap();

    assert_eq!(cfg.clock, ClockConfig::Manual { start_ms: 500 });
    assert_eq!(cfg.inbox_capacity, 1024);
    assert_eq!(cfg.debounce.quiet_period_ms, 300);
    assert_eq!(cfg.debounce.edge, DebounceEdge::Both);
    assert_eq!(cfg.debounce.max_wait_ms, None);
    assert_eq!(cfg.throttle, ThrottleConfig::default());
}

#[test]
fn test_from_json_str_rejects_invalid() {
    let parse = SchedulerConfig::from_json_str("{ not json").unwrap_err();
    assert!(parse.starts_with("parse error"), "{parse}");

    let invalid = SchedulerConfig::from_json_str(r#"{ "inbox_capacity": 0 }"#);
    assert!(invalid.is_err());
}

#[test]
fn test_from_env_reads_prefixed_variables() {
    let vars = [
        ("CLOCK", "manual"),
        ("CLOCK_START_MS", "42"),
        ("INBOX_CAPACITY", "16"),
        ("DEBOUNCE_EDGE", "leading"),
        ("THROTTLE_INTERVAL_MS", "75"),
        ("THROTTLE_TRAILING", "false"),
    ];
    for (name, value) in vars {
        std::env::set_var(format!("{ENV_PREFIX}{name}"), value);
    }

    let cfg = SchedulerConfig::from_env();

    for (name, _) in vars {
        std::env::remove_var(format!("{ENV_PREFIX}{name}"));
    }

    let cfg = cfg.unwrap();
    assert_eq!(cfg.clock, ClockConfig::Manual { start_ms: 42 });
    assert_eq!(cfg.inbox_capacity, 16);
    assert_eq!(cfg.debounce.edge, DebounceEdge::Leading);
    assert_eq!(cfg.throttle.interval_ms, 75);
    assert!(cfg.throttle.leading);
    assert!(!cfg.throttle.trailing);
}
