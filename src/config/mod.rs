//! Configuration models for the scheduler and its rate-limiting policies.

pub mod scheduler;

pub use scheduler::{ClockConfig, DebounceConfig, SchedulerConfig, ThrottleConfig, ENV_PREFIX};
