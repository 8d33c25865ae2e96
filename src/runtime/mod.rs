//! Runtime adapters: the cross-thread handoff into a scheduler.

pub mod remote;

pub use remote::{RemoteHandle, DEFAULT_INBOX_CAPACITY};
