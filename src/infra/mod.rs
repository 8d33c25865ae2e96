//! In-memory queue storage backing the scheduler loop.

pub mod queue;

pub use queue::{MicrotaskQueue, TimerQueue};
