//! Event bus — the only path from network tasks to the presentation layer.
//!
//! Any number of producers hold an [`EventBus`]; exactly one consumer owns
//! the matching [`EventReceiver`] and drains it on its own schedule.
//! Emitting never blocks. Events from one producer arrive in emission order;
//! nothing is promised across producers.

use std::net::IpAddr;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::ledger::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Everything the presentation layer can be told.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A human-readable log line.
    Log { message: String, severity: Severity },
    /// A peer announced itself for the first time.
    PeerDiscovered { address: IpAddr },
    /// Something the user should see as a notification.
    Notify { message: String },
    TransferStarted {
        direction: Direction,
        filename: String,
        filesize: u64,
    },
    /// Emitted after every chunk moved.
    TransferProgress {
        direction: Direction,
        bytes_moved: u64,
        filesize: u64,
        filename: String,
        /// Average bytes per second since the transfer started.
        speed: f64,
    },
    /// [`crate::TransferStats`] changed.
    StatsChanged,
    /// A record was appended to the ledger.
    HistoryChanged,
}

/// Producer side. Clone freely.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<Event>,
}

/// Consumer side. There is exactly one per bus.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventBus {
    /// Create a bus and its single consumer.
    pub fn channel() -> (EventBus, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventBus { tx }, EventReceiver { rx })
    }

    /// Enqueue an event. Dropped silently once the consumer is gone.
    pub fn emit(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event consumer gone, dropping event");
        }
    }

    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        self.emit(Event::Log {
            message: message.into(),
            severity,
        });
    }

    pub fn notify(&self, message: impl Into<String>) {
        self.emit(Event::Notify {
            message: message.into(),
        });
    }
}

impl EventReceiver {
    /// Everything queued so far, oldest first. Never waits.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait for the next event. `None` once every producer is dropped.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}
