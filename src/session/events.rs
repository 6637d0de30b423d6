//! Change notifications for whatever presents the session.
//!
//! Subscribers get their own unbounded channel. Emitting never blocks, and a
//! subscriber whose receiver was dropped is pruned on the next emit.

#![allow(missing_docs)]

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;

use crate::adb::DeviceIdentity;
use crate::executor::{ActionOutcome, Operation};
use crate::logger::HistoryEntry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    DeviceChanged {
        identity: DeviceIdentity,
    },
    /// A scan produced a new record set, replacing any previous one.
    ScanReplaced {
        serial: String,
        total: usize,
        classified: usize,
    },
    BatchStarted {
        operation: Operation,
        device: String,
        total: usize,
    },
    BatchProgress {
        index: usize,
        total: usize,
        identifier: String,
    },
    OutcomeProduced {
        index: usize,
        outcome: ActionOutcome,
    },
    HistoryAppended {
        entry: HistoryEntry,
    },
    HistoryCleared,
    BatchFinished {
        operation: Operation,
        device: String,
        succeeded: usize,
        failed: usize,
        cancelled: usize,
    },
    FilterApplied {
        query: String,
        visible: usize,
        total: usize,
    },
}

#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<SessionEvent>>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// New receiver seeing every event emitted from now on.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn emit(&self, event: SessionEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
