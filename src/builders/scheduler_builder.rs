//! Builder assembling a [`Scheduler`] from configuration and collaborators.

use std::rc::Rc;

use crate::config::{ClockConfig, SchedulerConfig};
use crate::core::{AuditSink, InMemoryAuditSink, Scheduler, SchedulerError, TaskFailure};
use crate::util::clock::{Clock, ManualClock, MonotonicClock};

/// Step-by-step scheduler construction.
///
/// An explicit clock, error handler or audit sink overrides what the
/// configuration would select.
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    clock: Option<Rc<dyn Clock>>,
    error_handler: Option<Box<dyn FnMut(&TaskFailure)>>,
    audit: Option<Box<dyn AuditSink>>,
}

impl SchedulerBuilder {
    /// Builder over default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(SchedulerConfig::default())
    }

    /// Builder over `config`. Validation happens in [`SchedulerBuilder::build`].
    #[must_use]
    pub fn from_config(config: SchedulerConfig) -> Self {
        Self {
            config,
            clock: None,
            error_handler: None,
            audit: None,
        }
    }

    /// Configuration the builder will apply.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Use `clock` instead of the configured one.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Rc::new(clock));
        self
    }

    /// Register an error handler on the built scheduler.
    #[must_use]
    pub fn with_error_handler(mut self, handler: impl FnMut(&TaskFailure) + 'static) -> Self {
        self.error_handler = Some(Box::new(handler));
        self
    }

    /// Attach an audit sink, overriding `audit_capacity`.
    #[must_use]
    pub fn with_audit(mut self, sink: impl AuditSink + 'static) -> Self {
        self.audit = Some(Box::new(sink));
        self
    }

    /// Validate the configuration and construct the scheduler.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when validation fails.
    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        self.config
            .validate()
            .map_err(SchedulerError::InvalidConfig)?;

        let clock: Rc<dyn Clock> = match (self.clock, self.config.clock) {
            (Some(clock), _) => clock,
            (None, ClockConfig::Monotonic) => Rc::new(MonotonicClock::new()),
            (None, ClockConfig::Manual { start_ms }) => Rc::new(ManualClock::starting_at(start_ms)),
        };
        let scheduler = Scheduler::with_parts(clock, self.config.inbox_capacity);

        if let Some(handler) = self.error_handler {
            scheduler.set_error_handler(handler);
        }
        match (self.audit, self.config.audit_capacity) {
            (Some(sink), _) => scheduler.set_audit_sink(sink),
            (None, Some(capacity)) => scheduler.set_audit_sink(InMemoryAuditSink::new(capacity)),
            (None, None) => {}
        }

        tracing::info!(
            scheduler_id = %scheduler.id(),
            clock = ?self.config.clock,
            "scheduler built"
        );
        Ok(scheduler)
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
