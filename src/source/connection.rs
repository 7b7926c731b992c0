//! Connection lifecycle state machine.
//!
//! States move `Disconnected -> Connecting -> Connected -> (Disconnected | Error)`.
//! Any close that was not requested by the user schedules a reconnect with
//! exponential backoff; a manual [`ConnectionManager::disconnect`] suppresses
//! reconnection until the next manual connect.
//!
//! Timers are plain deadlines. The owner drives them by calling
//! [`ConnectionManager::poll_reconnect`] (or waiting on
//! [`ConnectionManager::next_deadline`]), so nothing fires behind its back.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{Connector, Endpoint, EventSink, SessionEvent, TransportEvent, TransportHandle};
use crate::bus::{EventBus, MonitorEvent};
use crate::error::IngestError;

/// Transport-facing connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Error => "Error",
        }
    }
}

/// Link quality estimate.
///
/// This is a heuristic based only on how long ago the last validated message
/// arrived. It is not a round-trip measurement and ignores transport pings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionQuality {
    Good,
    Fair,
    Poor,
}

impl ConnectionQuality {
    const GOOD_WITHIN: Duration = Duration::from_secs(1);
    const FAIR_WITHIN: Duration = Duration::from_secs(3);

    /// Classify the time elapsed since the last message.
    pub fn from_silence(silence: Duration) -> Self {
        if silence < Self::GOOD_WITHIN {
            ConnectionQuality::Good
        } else if silence < Self::FAIR_WITHIN {
            ConnectionQuality::Fair
        } else {
            ConnectionQuality::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConnectionQuality::Good => "Good",
            ConnectionQuality::Fair => "Fair",
            ConnectionQuality::Poor => "Poor",
        }
    }
}

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based):
    /// `min(initial * 2^(attempt - 1), max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .checked_mul(1u32 << exponent)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Owns the transport session and its reconnection schedule.
#[derive(Debug)]
pub struct ConnectionManager {
    connector: Box<dyn Connector>,
    policy: ReconnectPolicy,
    bus: EventBus,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    state: ConnectionState,
    endpoint: Option<String>,
    handle: Option<TransportHandle>,
    /// Incremented per opened session; events from older sessions are ignored.
    generation: u64,
    attempts: u32,
    reconnect_at: Option<Instant>,
    manual_disconnect: bool,
    last_message_at: Option<Instant>,
}

impl ConnectionManager {
    pub fn new(connector: Box<dyn Connector>, policy: ReconnectPolicy, bus: EventBus) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            connector,
            policy,
            bus,
            events_tx,
            events_rx,
            state: ConnectionState::Disconnected,
            endpoint: None,
            handle: None,
            generation: 0,
            attempts: 0,
            reconnect_at: None,
            manual_disconnect: false,
            last_message_at: None,
        }
    }

    /// Open a session to `endpoint`.
    ///
    /// Returns `false` (and logs a warning) if a session is already
    /// connecting or open.
    pub fn connect(&mut self, endpoint: &str, now: Instant) -> bool {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            warn!("Already {}; ignoring connect to {}", self.state.label().to_lowercase(), endpoint);
            return false;
        }

        self.manual_disconnect = false;
        self.attempts = 0;
        self.reconnect_at = None;
        self.endpoint = Some(endpoint.trim().to_string());
        self.open(now);
        true
    }

    /// Close the session and stop reconnecting.
    pub fn disconnect(&mut self) {
        self.manual_disconnect = true;
        self.reconnect_at = None;
        self.attempts = 0;
        // Anything still queued from the closed session is now stale
        self.generation += 1;
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
        info!("Disconnected by user");
        self.set_state(
            ConnectionState::Disconnected,
            Some("Disconnected by user".to_string()),
        );
    }

    fn open(&mut self, now: Instant) {
        let Some(raw) = self.endpoint.clone() else {
            return;
        };

        if let Some(old) = self.handle.take() {
            old.close();
        }
        self.generation += 1;
        self.set_state(ConnectionState::Connecting, Some(format!("Connecting to {}", raw)));

        let sink = EventSink::new(self.generation, self.events_tx.clone());
        let opened = Endpoint::parse(&raw).and_then(|endpoint| self.connector.open(&endpoint, sink));

        match opened {
            Ok(handle) => {
                debug!("Transport session {} started for {}", self.generation, raw);
                self.handle = Some(handle);
            }
            Err(e) => {
                warn!("Failed to open {}: {}", raw, e);
                self.set_state(ConnectionState::Error, Some(e.to_string()));
                self.schedule_reconnect(now);
            }
        }
    }

    /// Apply one transport event. Returns the inbound frame for `Message`
    /// and `Undecodable` events from the current session, the latter as an
    /// [`IngestError::Malformed`].
    pub fn handle_event(
        &mut self,
        event: SessionEvent,
        now: Instant,
    ) -> Option<Result<String, IngestError>> {
        if event.generation != self.generation {
            debug!(
                "Ignoring event from stale session {} (current {})",
                event.generation, self.generation
            );
            return None;
        }

        match event.event {
            TransportEvent::Opened => {
                self.attempts = 0;
                self.reconnect_at = None;
                let message = self.endpoint.as_ref().map(|e| format!("Connected to {}", e));
                info!("{}", message.as_deref().unwrap_or("Connected"));
                self.set_state(ConnectionState::Connected, message);
                None
            }
            TransportEvent::Message(text) => {
                if self.manual_disconnect {
                    return None;
                }
                Some(Ok(text))
            }
            TransportEvent::Undecodable(reason) => {
                if self.manual_disconnect {
                    return None;
                }
                Some(Err(IngestError::Malformed(reason)))
            }
            TransportEvent::Error(message) => {
                if !self.manual_disconnect {
                    warn!("Transport error: {}", message);
                    self.set_state(ConnectionState::Error, Some(message));
                }
                None
            }
            TransportEvent::Closed(reason) => {
                self.handle = None;
                if self.manual_disconnect {
                    debug!("Session closed after manual disconnect");
                    return None;
                }
                // An error state keeps its message; a clean close reports the reason
                if self.state != ConnectionState::Error {
                    self.set_state(ConnectionState::Disconnected, reason);
                }
                self.schedule_reconnect(now);
                None
            }
        }
    }

    fn schedule_reconnect(&mut self, now: Instant) {
        if self.manual_disconnect {
            return;
        }
        self.attempts = self.attempts.saturating_add(1);
        let delay = self.policy.delay_for(self.attempts);
        self.reconnect_at = Some(now + delay);
        info!(
            "Reconnect attempt {} in {}ms",
            self.attempts,
            delay.as_millis()
        );
        self.bus.publish(MonitorEvent::ReconnectScheduled {
            attempt: self.attempts,
            delay,
        });
    }

    /// Fire the reconnect timer if it is due. Returns `true` if a new
    /// session was started.
    pub fn poll_reconnect(&mut self, now: Instant) -> bool {
        match self.reconnect_at {
            Some(at) if at <= now && !self.manual_disconnect => {
                self.reconnect_at = None;
                self.open(now);
                true
            }
            _ => false,
        }
    }

    /// Next transport event, if one is queued.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Wait for the next transport event.
    ///
    /// Never resolves to `None` while the manager lives, since it keeps a
    /// sender of its own.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// When the pending reconnect is due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Record that a validated message arrived.
    pub fn mark_message(&mut self, now: Instant) {
        self.last_message_at = Some(now);
    }

    /// Quality estimate, `None` before the first validated message.
    pub fn quality(&self, now: Instant) -> Option<ConnectionQuality> {
        self.last_message_at
            .map(|at| ConnectionQuality::from_silence(now.saturating_duration_since(at)))
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Whether a reconnect is scheduled.
    pub fn pending_reconnect(&self) -> bool {
        self.reconnect_at.is_some()
    }

    pub fn is_manual_disconnect(&self) -> bool {
        self.manual_disconnect
    }

    fn set_state(&mut self, state: ConnectionState, message: Option<String>) {
        self.state = state;
        self.bus
            .publish(MonitorEvent::ConnectionChanged { state, message });
    }
}
