//! Queue backends: a FIFO for microtasks and a ready-time heap for timers.

pub mod microtask;
pub mod timer;

pub use microtask::MicrotaskQueue;
pub use timer::TimerQueue;
