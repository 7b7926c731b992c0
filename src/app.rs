//! Application state for the terminal dashboard.
//!
//! The [`App`] owns the [`MonitorEngine`] and turns engine events into
//! display state: the connection banner, the standing fall alert, the
//! finger/fall indicators and short-lived status messages.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::bus::MonitorEvent;
use crate::data::{Confirmation, ExportFormat};
use crate::engine::MonitorEngine;
use crate::source::ConnectionState;
use crate::ui::Theme;

/// Squat count that fills the progress gauge.
pub const SQUAT_TARGET: f64 = 50.0;

const STATUS_TTL: Duration = Duration::from_secs(3);

/// Modal prompt capturing keyboard input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// "Clear all session data? (y/n)"
    ConfirmClear,
    /// Editing the endpoint; holds the text typed so far.
    EditEndpoint(String),
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub show_help: bool,
    pub prompt: Option<Prompt>,
    pub theme: Theme,

    engine: MonitorEngine,
    events: mpsc::UnboundedReceiver<MonitorEvent>,
    export_dir: PathBuf,

    /// Arrival timestamp of the fall that raised the alert, until dismissed.
    pub fall_alert: Option<i64>,
    /// `None` until the first reading arrives.
    pub finger_detected: Option<bool>,
    pub fall_detected: Option<bool>,
    /// Message attached to the last connection change.
    pub connection_message: Option<String>,
    /// When the pending reconnect fires, for the countdown in the header.
    pub reconnect_due: Option<(u32, Instant)>,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    pub fn new(engine: MonitorEngine, export_dir: PathBuf, theme: Theme) -> Self {
        let events = engine.subscribe();
        Self {
            running: true,
            show_help: false,
            prompt: None,
            theme,
            engine,
            events,
            export_dir,
            fall_alert: None,
            finger_detected: None,
            fall_detected: None,
            connection_message: None,
            reconnect_due: None,
            status_message: None,
        }
    }

    pub fn engine(&self) -> &MonitorEngine {
        &self.engine
    }

    /// Drive the engine and fold its events into display state.
    pub fn tick(&mut self) {
        self.engine.poll();
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::ConnectionChanged { state, message } => {
                self.connection_message = message;
                if state == ConnectionState::Connected {
                    self.reconnect_due = None;
                }
            }
            MonitorEvent::ReconnectScheduled { attempt, delay } => {
                self.reconnect_due = Some((attempt, Instant::now() + delay));
            }
            MonitorEvent::Reading { reading, .. } => {
                self.finger_detected = Some(reading.finger_detected);
                self.fall_detected = Some(reading.fall_detected);
            }
            MonitorEvent::FallDetected { timestamp } => {
                // Keep the first unacknowledged fall
                self.fall_alert.get_or_insert(timestamp);
            }
            MonitorEvent::Rejected { reason } => {
                self.set_status_message(format!("Dropped message: {}", reason));
            }
            MonitorEvent::StorageWarning { message } => {
                self.set_status_message(message);
            }
            MonitorEvent::SessionCleared => {
                self.finger_detected = None;
                self.fall_detected = None;
                self.set_status_message("Session cleared".to_string());
            }
        }
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired (3 seconds).
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < STATUS_TTL {
                return Some(msg);
            }
        }
        None
    }

    pub fn connect(&mut self) {
        match self.engine.connect_saved() {
            Ok(true) => {}
            Ok(false) => self.set_status_message("Already connected".to_string()),
            Err(e) => self.set_status_message(e.to_string()),
        }
    }

    pub fn disconnect(&mut self) {
        self.engine.disconnect();
        self.tick();
    }

    /// Export the session into the export directory.
    pub fn export(&mut self, format: ExportFormat) {
        let message = match self.engine.export_to_dir(format, &self.export_dir) {
            Ok(Some(path)) => format!("Exported to {}", path.display()),
            Ok(None) => "No data to export".to_string(),
            Err(e) => e.to_string(),
        };
        self.set_status_message(message);
    }

    pub fn toggle_chart_pause(&mut self) {
        let paused = self.engine.toggle_chart_pause();
        self.set_status_message(if paused { "Chart paused" } else { "Chart resumed" }.to_string());
    }

    /// Ask before clearing the session.
    pub fn request_clear(&mut self) {
        self.prompt = Some(Prompt::ConfirmClear);
    }

    /// Answer the clear prompt.
    pub fn confirm_clear(&mut self, accepted: bool) {
        if self.prompt != Some(Prompt::ConfirmClear) {
            return;
        }
        self.prompt = None;
        let confirmation = if accepted {
            Confirmation::Accepted
        } else {
            Confirmation::Declined
        };
        self.engine.clear(confirmation);
        self.tick();
    }

    /// Open the endpoint editor prefilled with the current endpoint.
    pub fn start_edit_endpoint(&mut self) {
        self.prompt = Some(Prompt::EditEndpoint(self.engine.endpoint().to_string()));
    }

    pub fn endpoint_push(&mut self, c: char) {
        if let Some(Prompt::EditEndpoint(text)) = &mut self.prompt {
            text.push(c);
        }
    }

    pub fn endpoint_pop(&mut self) {
        if let Some(Prompt::EditEndpoint(text)) = &mut self.prompt {
            text.pop();
        }
    }

    /// Connect to the edited endpoint, replacing any open session.
    pub fn submit_endpoint(&mut self) {
        let Some(Prompt::EditEndpoint(text)) = self.prompt.take() else {
            return;
        };
        if text.trim().is_empty() {
            self.set_status_message("Endpoint must not be empty".to_string());
            return;
        }
        if matches!(
            self.engine.connection_state(),
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            self.engine.disconnect();
        }
        if let Err(e) = self.engine.connect(&text) {
            self.set_status_message(e.to_string());
        }
    }

    pub fn cancel_prompt(&mut self) {
        self.prompt = None;
    }

    /// Acknowledge the fall alert. Stored data is unaffected.
    pub fn dismiss_fall_alert(&mut self) {
        self.fall_alert = None;
    }

    /// Latest squat count as a fraction of [`SQUAT_TARGET`].
    pub fn squat_progress(&self) -> f64 {
        self.engine
            .latest()
            .map(|(reading, _)| reading.squat_count)
            .filter(|count| count.is_finite())
            .map_or(0.0, |count| (count / SQUAT_TARGET).clamp(0.0, 1.0))
    }

    /// Seconds until the pending reconnect, if one is scheduled.
    pub fn reconnect_countdown(&self) -> Option<(u32, u64)> {
        if !self.engine.connection().pending_reconnect() {
            return None;
        }
        self.reconnect_due
            .map(|(attempt, due)| (attempt, due.saturating_duration_since(Instant::now()).as_secs()))
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }
}
