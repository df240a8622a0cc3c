//! Notifications delivered to the hosting application.

use std::sync::mpsc::{self, Receiver, Sender};

/// Something the host may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent {
    /// Fired once in a secondary, right after it found a running primary.
    OtherInstanceDetected { pid: u32 },
    /// Fired in the primary once per request a secondary left in the record.
    InstanceRequested,
    /// The primary's record was superseded by another process.
    LockLost { owner_pid: u32 },
}

/// Callback registered with [`crate::InstanceLock::on_event`].
///
/// Runs while the lock is busy, possibly on the heartbeat thread; it must
/// not call back into the same lock.
pub type EventCallback = Box<dyn FnMut(&LockEvent) + Send + 'static>;

/// Fan-out of events to channel subscribers and callbacks.
#[derive(Default)]
pub(super) struct Emitter {
    senders: Vec<Sender<LockEvent>>,
    callbacks: Vec<EventCallback>,
}

impl Emitter {
    pub(super) fn subscribe(&mut self) -> Receiver<LockEvent> {
        let (tx, rx) = mpsc::channel();
        self.senders.push(tx);
        rx
    }

    pub(super) fn on_event(&mut self, callback: EventCallback) {
        self.callbacks.push(callback);
    }

    pub(super) fn emit(&mut self, event: LockEvent) {
        for callback in &mut self.callbacks {
            callback(&event);
        }
        // Dropped receivers unsubscribe themselves.
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("senders", &self.senders.len())
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
