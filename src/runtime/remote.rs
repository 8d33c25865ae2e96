//! Thread-safe handoff into a scheduler's single thread.
//!
//! Other threads never touch the queues. They push messages into a bounded
//! inbox, and the loop turns each message into an ordinary microtask or
//! macrotask when it next pulls the inbox (at every loop boundary and while
//! idle-waiting).

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::error::{DelayKind, SchedulerError};
use crate::core::task::TaskResult;

/// Default capacity of the cross-thread inbox.
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;

/// Sendable unit of work submitted from another thread.
pub(crate) type SendTaskFn = Box<dyn FnOnce() -> TaskResult + Send>;

/// Message carried over the inbox.
pub(crate) enum RemoteMessage {
    Microtask(SendTaskFn),
    Macrotask { run: SendTaskFn, delay_ms: u64 },
    Stop,
}

/// Receiving side owned by the scheduler.
pub(crate) struct Inbox {
    tx: Sender<RemoteMessage>,
    rx: Receiver<RemoteMessage>,
}

impl Inbox {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self { tx, rx }
    }

    pub(crate) fn handle(&self, scheduler_id: Uuid) -> RemoteHandle {
        RemoteHandle {
            tx: self.tx.clone(),
            scheduler_id,
        }
    }

    pub(crate) fn try_recv(&self) -> Option<RemoteMessage> {
        self.rx.try_recv().ok()
    }

    /// Block up to `timeout`. `None` means the wait elapsed.
    pub(crate) fn recv_timeout(&self, timeout: Duration) -> Option<RemoteMessage> {
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Block until a message arrives.
    pub(crate) fn recv(&self) -> Option<RemoteMessage> {
        self.rx.recv().ok()
    }
}

/// Cloneable, `Send + Sync` handle for submitting work from other threads.
///
/// Delays of remote macrotasks are measured from the moment the loop accepts
/// the message, on the scheduler's own clock.
#[derive(Clone)]
pub struct RemoteHandle {
    tx: Sender<RemoteMessage>,
    scheduler_id: Uuid,
}

impl RemoteHandle {
    /// Identifier of the scheduler this handle feeds.
    #[must_use]
    pub const fn scheduler_id(&self) -> Uuid {
        self.scheduler_id
    }

    /// Submit a microtask.
    ///
    /// # Errors
    ///
    /// `InboxFull` when the inbox is at capacity, `Disconnected` when the
    /// scheduler has been dropped.
    pub fn schedule_microtask<F>(&self, f: F) -> Result<(), SchedulerError>
    where
        F: FnOnce() -> TaskResult + Send + 'static,
    {
        self.send(RemoteMessage::Microtask(Box::new(f)))
    }

    /// Submit a macrotask that becomes ready `delay_ms` after the loop accepts it.
    ///
    /// # Errors
    ///
    /// `InvalidDelay` for a negative delay, plus the errors of
    /// [`RemoteHandle::schedule_microtask`].
    pub fn schedule_macrotask<F>(&self, f: F, delay_ms: i64) -> Result<(), SchedulerError>
    where
        F: FnOnce() -> TaskResult + Send + 'static,
    {
        let delay_ms = SchedulerError::check_delay(DelayKind::Delay, delay_ms)?;
        self.send(RemoteMessage::Macrotask {
            run: Box::new(f),
            delay_ms,
        })
    }

    /// Ask the loop to stop at its next boundary.
    ///
    /// # Errors
    ///
    /// Same as [`RemoteHandle::schedule_microtask`].
    pub fn stop(&self) -> Result<(), SchedulerError> {
        self.send(RemoteMessage::Stop)
    }

    fn send(&self, msg: RemoteMessage) -> Result<(), SchedulerError> {
        match self.tx.try_send(msg) {
            Ok(()) => {
                debug!(scheduler_id = %self.scheduler_id, "remote message queued");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                warn!(scheduler_id = %self.scheduler_id, "remote inbox is full");
                Err(SchedulerError::InboxFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(SchedulerError::Disconnected),
        }
    }
}

impl std::fmt::Debug for RemoteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteHandle")
            .field("scheduler_id", &self.scheduler_id)
            .field("queued", &self.tx.len())
            .finish()
    }
}
