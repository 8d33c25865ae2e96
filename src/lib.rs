//! # Deferred Scheduler
//!
//! A single-threaded, cooperative deferred-execution scheduler for hosts that
//! need browser-style event-loop ordering: a microtask FIFO drained to empty
//! before each macrotask, timers ordered by ready time then insertion order,
//! and rate-limiting wrappers (debounce, throttle) built on top of them.
//!
//! ## Ordering Guarantees
//!
//! - **Microtasks** run in enqueue order, including ones enqueued by a running
//!   microtask, and all of them run before the next macrotask.
//! - **Macrotasks** become eligible at `now + delay` and run one at a time,
//!   ties broken by insertion order. Never by priority.
//! - **Run-to-completion**: a task is never interrupted. Cancellation only
//!   affects tasks that have not started.
//! - **Failure isolation**: a task that returns `Err` or panics is reported to
//!   the error handler and the loop carries on.
//!
//! ## Clocks
//!
//! The loop is generic over a [`util::Clock`]. With a [`util::ManualClock`]
//! it jumps straight to the next ready time, which makes every timing rule
//! deterministic in tests. With a [`util::MonotonicClock`] it waits for real
//! time to pass, listening on the cross-thread inbox meanwhile.
//!
//! ```rust,ignore
//! use deferred_scheduler::core::Scheduler;
//! use deferred_scheduler::policy::DebounceEdge;
//!
//! let scheduler = Scheduler::manual();
//! let search = scheduler.debounce(
//!     |query: String| {
//!         println!("searching for {query}");
//!         Ok(())
//!     },
//!     100,
//!     DebounceEdge::Trailing,
//! );
//!
//! for query in ["r", "ru", "rus", "rust"] {
//!     search.invoke(query.to_string());
//! }
//! scheduler.run_until_idle(); // prints "searching for rust" once, at t=100
//! ```
//!
//! ## Threads
//!
//! [`core::Scheduler`] is `!Send`. Other threads submit work through a
//! [`runtime::RemoteHandle`], which hands closures to the loop over a bounded
//! channel; the loop turns them into ordinary microtasks and macrotasks.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: tasks, the loop, errors, auditing.
pub mod core;
/// Configuration models for the scheduler and policies.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// In-memory queue storage backing the loop.
pub mod infra;
/// Debounce and throttle controllers.
pub mod policy;
/// Cross-thread handoff into the loop.
pub mod runtime;
/// Shared utilities: clocks and telemetry.
pub mod util;

pub use crate::core::{Scheduler, SchedulerError, TaskResult};
pub use crate::policy::{DebounceEdge, Debouncer, Throttler};
