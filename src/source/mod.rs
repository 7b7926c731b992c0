//! Transport abstraction and connection lifecycle.
//!
//! A [`Connector`] opens one transport session for an [`Endpoint`] and
//! reports what happens on it as [`TransportEvent`]s through an
//! [`EventSink`]. The [`ConnectionManager`] owns the lifecycle on top:
//! state transitions, reconnection with exponential backoff and the
//! link quality estimate.
//!
//! Transport tasks never touch engine state. They only send events, which
//! the engine drains from a single place.

mod connection;
mod endpoint;
mod stream;

pub use connection::{ConnectionManager, ConnectionQuality, ConnectionState, ReconnectPolicy};
pub use endpoint::Endpoint;
pub use stream::NetworkConnector;

use std::fmt::Debug;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::TransportError;

/// Lifecycle and data events produced by a transport session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The session is open and may deliver messages.
    Opened,
    /// One inbound text frame.
    Message(String),
    /// An inbound frame that is not valid UTF-8, with the decode error.
    Undecodable(String),
    /// A transport-level error. A `Closed` normally follows.
    Error(String),
    /// The session ended, with an optional reason.
    Closed(Option<String>),
}

/// A transport event tagged with the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub generation: u64,
    pub event: TransportEvent,
}

/// Sending half handed to a transport session.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { generation, tx }
    }

    /// Send an event. Returns `false` once the engine side is gone.
    pub fn send(&self, event: TransportEvent) -> bool {
        self.tx
            .send(SessionEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Handle to a running transport session. Dropping it stops the session.
#[derive(Debug, Default)]
pub struct TransportHandle {
    task: Option<JoinHandle<()>>,
}

impl TransportHandle {
    /// Wrap the task driving a session.
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// A handle with no background task (for connectors driven externally).
    pub fn detached() -> Self {
        Self::default()
    }

    /// Stop the session.
    pub fn close(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Trait for opening transport sessions.
///
/// `open` must not block: it starts the session and returns. Failing to even
/// start (bad scheme, no runtime) is reported as an error and treated by the
/// connection manager like an abnormal close.
pub trait Connector: Send + Debug {
    fn open(&self, endpoint: &Endpoint, sink: EventSink) -> Result<TransportHandle, TransportError>;
}
