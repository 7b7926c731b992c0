//! Engine notifications delivered to subscribers over channels.
//!
//! Every subscriber receives every event in the order it was published.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::data::{Assessment, Reading};
use crate::source::ConnectionState;

/// Something the presentation layer may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// The connection changed state.
    ConnectionChanged {
        state: ConnectionState,
        message: Option<String>,
    },
    /// A reconnect attempt was scheduled after a non-manual close.
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// A validated reading was stored and classified.
    Reading {
        reading: Reading,
        assessment: Assessment,
    },
    /// A payload was dropped by the validator.
    Rejected { reason: String },
    /// Persistence degraded but the engine keeps running.
    StorageWarning { message: String },
    /// The reading reported a fall. Stays raised until dismissed by the user.
    FallDetected { timestamp: i64 },
    /// The session was cleared by the user.
    SessionCleared,
}

/// Fan-out of [`MonitorEvent`]s to any number of subscribers.
///
/// Clones share the subscriber list. Closed receivers are pruned on publish.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<MonitorEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<MonitorEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber.
    pub fn publish(&self, event: MonitorEvent) {
        self.subscribers.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
