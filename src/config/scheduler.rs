//! Scheduler and policy configuration structures.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::policy::DebounceEdge;
use crate::runtime::remote::DEFAULT_INBOX_CAPACITY;

/// Prefix of the environment variables read by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "DEFERRED_SCHEDULER_";

/// Clock selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClockConfig {
    /// Wall clock; the loop waits for timers in real time.
    #[default]
    Monotonic,
    /// Virtual clock; the loop jumps to each ready time.
    Manual {
        /// Initial reading in milliseconds.
        #[serde(default)]
        start_ms: u64,
    },
}

/// Debounce policy defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Quiet period in milliseconds. Zero or negative runs on the next microtask.
    pub quiet_period_ms: i64,
    /// Edge that executes.
    #[serde(default)]
    pub edge: DebounceEdge,
    /// Optional cap on how long a burst may postpone execution.
    #[serde(default)]
    pub max_wait_ms: Option<i64>,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: 100,
            edge: DebounceEdge::Trailing,
            max_wait_ms: None,
        }
    }
}

/// Throttle policy defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Minimum spacing between executions in milliseconds.
    pub interval_ms: i64,
    /// Execute the first call of a burst immediately.
    #[serde(default = "default_true")]
    pub leading: bool,
    /// Deliver the latest call of a window once it closes.
    #[serde(default = "default_true")]
    pub trailing: bool,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            interval_ms: 200,
            leading: true,
            trailing: true,
        }
    }
}

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Clock driving the loop.
    #[serde(default)]
    pub clock: ClockConfig,
    /// Capacity of the cross-thread inbox.
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
    /// Attach an in-memory audit sink of this many events.
    #[serde(default)]
    pub audit_capacity: Option<usize>,
    /// Debounce defaults.
    #[serde(default)]
    pub debounce: DebounceConfig,
    /// Throttle defaults.
    #[serde(default)]
    pub throttle: ThrottleConfig,
}

const fn default_true() -> bool {
    true
}

const fn default_inbox_capacity() -> usize {
    DEFAULT_INBOX_CAPACITY
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            clock: ClockConfig::default(),
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            audit_capacity: None,
            debounce: DebounceConfig::default(),
            throttle: ThrottleConfig::default(),
        }
    }
}

impl DebounceConfig {
    /// Validate debounce values. A non-positive quiet period is allowed.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(max_wait) = self.max_wait_ms {
            if max_wait < 0 {
                return Err(format!("max_wait_ms must not be negative, got {max_wait}"));
            }
        }
        Ok(())
    }
}

impl ThrottleConfig {
    /// Validate throttle values.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_ms < 0 {
            return Err(format!("interval_ms must not be negative, got {}", self.interval_ms));
        }
        if !self.leading && !self.trailing {
            return Err("leading and trailing cannot both be disabled".into());
        }
        Ok(())
    }
}

impl SchedulerConfig {
    /// Validate all sections.
    pub fn validate(&self) -> Result<(), String> {
        if self.inbox_capacity == 0 {
            return Err("inbox_capacity must be greater than 0".into());
        }
        if self.audit_capacity == Some(0) {
            return Err("audit_capacity must be greater than 0 when set".into());
        }
        self.debounce
            .validate()
            .map_err(|e| format!("debounce invalid: {e}"))?;
        self.throttle
            .validate()
            .map_err(|e| format!("throttle invalid: {e}"))?;
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build from `DEFERRED_SCHEDULER_*` environment variables, after loading
    /// a `.env` file if one is present. Unset variables keep their defaults.
    ///
    /// Recognised: `CLOCK` (`monotonic` | `manual`), `CLOCK_START_MS`,
    /// `INBOX_CAPACITY`, `AUDIT_CAPACITY`, `DEBOUNCE_QUIET_MS`,
    /// `DEBOUNCE_EDGE` (`leading` | `trailing` | `both`), `DEBOUNCE_MAX_WAIT_MS`,
    /// `THROTTLE_INTERVAL_MS`, `THROTTLE_LEADING`, `THROTTLE_TRAILING`.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();

        if let Some(kind) = var("CLOCK") {
            cfg.clock = match kind.as_str() {
                "monotonic" => ClockConfig::Monotonic,
                "manual" => ClockConfig::Manual {
                    start_ms: parsed("CLOCK_START_MS")?.unwrap_or(0),
                },
                other => return Err(format!("unknown clock `{other}`")),
            };
        }
        if let Some(capacity) = parsed("INBOX_CAPACITY")? {
            cfg.inbox_capacity = capacity;
        }
        if let Some(capacity) = parsed("AUDIT_CAPACITY")? {
            cfg.audit_capacity = Some(capacity);
        }
        if let Some(quiet) = parsed("DEBOUNCE_QUIET_MS")? {
            cfg.debounce.quiet_period_ms = quiet;
        }
        if let Some(edge) = var("DEBOUNCE_EDGE") {
            cfg.debounce.edge = serde_json::from_value(serde_json::Value::String(edge.clone()))
                .map_err(|_| format!("unknown debounce edge `{edge}`"))?;
        }
        if let Some(max_wait) = parsed("DEBOUNCE_MAX_WAIT_MS")? {
            cfg.debounce.max_wait_ms = Some(max_wait);
        }
        if let Some(interval) = parsed("THROTTLE_INTERVAL_MS")? {
            cfg.throttle.interval_ms = interval;
        }
        if let Some(leading) = parsed("THROTTLE_LEADING")? {
            cfg.throttle.leading = leading;
        }
        if let Some(trailing) = parsed("THROTTLE_TRAILING")? {
            cfg.throttle.trailing = trailing;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn var(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{name}")).ok()
}

fn parsed<T: FromStr>(name: &str) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| format!("{ENV_PREFIX}{name}=`{raw}`: {e}"))
        })
        .transpose()
}
