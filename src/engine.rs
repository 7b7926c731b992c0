//! The monitoring engine.
//!
//! [`MonitorEngine`] is the single mutation point for connection and session
//! state. Transport tasks only enqueue events; the engine drains them in
//! delivery order and runs validation, classification, chart update and
//! persistence for one reading to completion before looking at the next.
//!
//! Drive it either by calling [`MonitorEngine::poll`] from a UI loop or by
//! awaiting [`MonitorEngine::step`] in an async task.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, MonitorEvent};
use crate::config::Settings;
use crate::data::{
    validator, Assessment, ChartWindow, Classifier, Confirmation, Export, ExportFormat, Reading,
    SessionStatistics, SessionStore, Thresholds, DEFAULT_CAPACITY, DEFAULT_CHART_CAPACITY,
    DEFAULT_FALLBACK_RETAIN,
};
use crate::error::{IngestError, MonitorError, StorageError};
use crate::source::{
    ConnectionManager, ConnectionQuality, ConnectionState, Connector, ReconnectPolicy,
    SessionEvent,
};
use crate::storage::SharedStorage;

/// Storage key of the last endpoint the user connected to.
pub const ENDPOINT_KEY: &str = "athleteMonitorEndpoint";

/// Construction parameters for [`MonitorEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub policy: ReconnectPolicy,
    pub session_capacity: usize,
    pub fallback_retain: usize,
    pub chart_capacity: usize,
    pub thresholds: Thresholds,
    /// Endpoint used when none has been persisted.
    pub default_endpoint: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: ReconnectPolicy::default(),
            session_capacity: DEFAULT_CAPACITY,
            fallback_retain: DEFAULT_FALLBACK_RETAIN,
            chart_capacity: DEFAULT_CHART_CAPACITY,
            thresholds: Thresholds::default(),
            default_endpoint: crate::config::DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl From<&Settings> for EngineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            policy: settings.reconnect.policy(),
            session_capacity: settings.session.capacity,
            fallback_retain: settings.session.fallback_retain,
            chart_capacity: settings.chart.capacity,
            thresholds: settings.thresholds.clone(),
            default_endpoint: settings.endpoint.clone(),
        }
    }
}

/// Per-outcome counts of inbound messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestCounters {
    pub accepted: u64,
    /// Frames that were not decodable JSON.
    pub malformed: u64,
    /// Documents that failed the schema check.
    pub rejected: u64,
}

impl IngestCounters {
    pub fn dropped(&self) -> u64 {
        self.malformed + self.rejected
    }
}

/// Telemetry ingestion and session-state engine.
#[derive(Debug)]
pub struct MonitorEngine {
    connection: ConnectionManager,
    session: SessionStore,
    chart: ChartWindow,
    classifier: Classifier,
    storage: SharedStorage,
    bus: EventBus,
    counters: IngestCounters,
    latest: Option<(Reading, Assessment)>,
    endpoint: String,
}

impl MonitorEngine {
    /// Build an engine, restoring the persisted session and endpoint.
    pub fn new(config: EngineConfig, connector: Box<dyn Connector>, storage: SharedStorage) -> Self {
        let bus = EventBus::new();
        let session = SessionStore::open(
            storage.clone(),
            config.session_capacity,
            config.fallback_retain,
        );
        let endpoint = load_endpoint(&storage).unwrap_or(config.default_endpoint);

        Self {
            connection: ConnectionManager::new(connector, config.policy, bus.clone()),
            session,
            chart: ChartWindow::new(config.chart_capacity),
            classifier: Classifier::new(config.thresholds),
            storage,
            bus,
            counters: IngestCounters::default(),
            latest: None,
            endpoint,
        }
    }

    /// Receive every event published from now on, in order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<MonitorEvent> {
        self.bus.subscribe()
    }

    /// The endpoint that [`connect_saved`](Self::connect_saved) will use.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Connect to `endpoint` and remember it as the default.
    ///
    /// Returns `Ok(false)` if a session is already connecting or open.
    pub fn connect(&mut self, endpoint: &str) -> Result<bool, MonitorError> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(MonitorError::EmptyEndpoint);
        }

        if !self.connection.connect(endpoint, clock_now()) {
            return Ok(false);
        }

        if endpoint != self.endpoint || load_endpoint(&self.storage).is_none() {
            self.save_endpoint(endpoint);
        }
        self.endpoint = endpoint.to_string();
        Ok(true)
    }

    /// Connect to the remembered endpoint.
    pub fn connect_saved(&mut self) -> Result<bool, MonitorError> {
        let endpoint = self.endpoint.clone();
        self.connect(&endpoint)
    }

    /// Close the session and stop reconnecting.
    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Process everything that is ready without blocking.
    pub fn poll(&mut self) -> usize {
        self.poll_at(clock_now())
    }

    /// [`poll`](Self::poll) with an explicit clock, for deterministic callers.
    ///
    /// Drains queued transport events, then fires the reconnect timer if it
    /// is due. Returns the number of transport events handled.
    pub fn poll_at(&mut self, now: Instant) -> usize {
        let mut handled = 0;
        while let Some(event) = self.connection.try_recv() {
            self.dispatch(event, now);
            handled += 1;
        }
        self.connection.poll_reconnect(now);
        handled
    }

    /// Wait for the next transport event or reconnect deadline and process
    /// everything that became ready.
    pub async fn step(&mut self) -> usize {
        let deadline = self.connection.next_deadline();
        let event = tokio::select! {
            event = self.connection.recv() => event,
            _ = wait_until(deadline) => None,
        };

        let now = clock_now();
        let mut handled = 0;
        if let Some(event) = event {
            self.dispatch(event, now);
            handled += 1;
        }
        handled + self.poll_at(now)
    }

    fn dispatch(&mut self, event: SessionEvent, now: Instant) {
        match self.connection.handle_event(event, now) {
            // Rejections are counted and published inside ingest_at
            Some(Ok(text)) => {
                let _ = self.ingest_at(&text, now);
            }
            Some(Err(e)) => self.reject(&e),
            None => {}
        }
    }

    fn reject(&mut self, e: &IngestError) {
        match e {
            IngestError::Malformed(_) => self.counters.malformed += 1,
            IngestError::Schema(_) => self.counters.rejected += 1,
        }
        warn!("Dropping payload: {}", e);
        self.bus.publish(MonitorEvent::Rejected {
            reason: e.to_string(),
        });
    }

    /// Validate, classify, chart and store one raw payload.
    pub fn ingest(&mut self, raw: &str) -> Result<Assessment, IngestError> {
        self.ingest_at(raw, clock_now())
    }

    /// [`ingest`](Self::ingest) with an explicit clock for the quality estimate.
    pub fn ingest_at(&mut self, raw: &str, now: Instant) -> Result<Assessment, IngestError> {
        let payload = match validator::validate(raw) {
            Ok(payload) => payload,
            Err(e) => {
                self.reject(&e);
                return Err(e);
            }
        };

        self.counters.accepted += 1;
        self.connection.mark_message(now);

        let reading = Reading::from_payload(payload, Utc::now().timestamp_millis());
        let assessment = self.classifier.assess(&reading);
        self.chart.push(&reading);

        let outcome = self.session.record(reading.clone());
        if let Some(message) = outcome.warning() {
            self.bus.publish(MonitorEvent::StorageWarning { message });
        }

        debug!(
            "Reading: HR {} ({}), SpO2 {} ({}), squats {}, posture {}",
            reading.heart_rate,
            assessment.heart_rate.label(),
            reading.spo2,
            assessment.spo2.label(),
            reading.squat_count,
            assessment.posture.label()
        );

        if assessment.fall_detected {
            warn!("Fall detected");
            self.bus.publish(MonitorEvent::FallDetected {
                timestamp: reading.timestamp,
            });
        }
        self.bus.publish(MonitorEvent::Reading {
            reading: reading.clone(),
            assessment,
        });
        self.latest = Some((reading, assessment));

        Ok(assessment)
    }

    pub fn statistics(&self) -> SessionStatistics {
        self.session.statistics()
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn chart(&self) -> &ChartWindow {
        &self.chart
    }

    /// Pause or resume the chart. Returns the new paused state.
    pub fn toggle_chart_pause(&mut self) -> bool {
        let paused = self.chart.toggle_pause();
        info!("Chart {}", if paused { "paused" } else { "resumed" });
        paused
    }

    /// Serialize the session. `Ok(None)` means a CSV export had no data.
    pub fn export(&mut self, format: ExportFormat) -> Result<Option<Export>, MonitorError> {
        self.export_at(format, Utc::now())
    }

    pub fn export_at(
        &mut self,
        format: ExportFormat,
        now: DateTime<Utc>,
    ) -> Result<Option<Export>, MonitorError> {
        Ok(self.session.export(format, now)?)
    }

    /// Export into `dir` under the stamped file name. Returns the written
    /// path, or `None` when a CSV export had no data.
    pub fn export_to_dir(
        &mut self,
        format: ExportFormat,
        dir: &Path,
    ) -> Result<Option<PathBuf>, MonitorError> {
        match self.export(format)? {
            Some(export) => Ok(Some(export.write_to_dir(dir)?)),
            None => Ok(None),
        }
    }

    /// Export to an explicit file. Returns `false` when there was no data.
    pub fn export_to_path(&mut self, format: ExportFormat, path: &Path) -> Result<bool, MonitorError> {
        match self.export(format)? {
            Some(export) => {
                export.write_to(path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Clear the session if confirmed. Returns whether anything was cleared.
    pub fn clear(&mut self, confirmation: Confirmation) -> bool {
        let Some(outcome) = self.session.clear(confirmation) else {
            return false;
        };

        self.chart.clear();
        self.classifier.reset();
        self.latest = None;
        if let Some(message) = outcome.warning() {
            self.bus.publish(MonitorEvent::StorageWarning { message });
        }
        self.bus.publish(MonitorEvent::SessionCleared);
        true
    }

    /// The last reading ingested since start or clear, with its assessment.
    pub fn latest(&self) -> Option<&(Reading, Assessment)> {
        self.latest.as_ref()
    }

    pub fn counters(&self) -> IngestCounters {
        self.counters
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn quality(&self) -> Option<ConnectionQuality> {
        self.connection.quality(clock_now())
    }

    pub fn thresholds(&self) -> &Thresholds {
        self.classifier.thresholds()
    }

    fn save_endpoint(&self, endpoint: &str) {
        let result = serde_json::to_string(endpoint)
            .map_err(StorageError::from)
            .and_then(|value| self.storage.save(ENDPOINT_KEY, &value));
        if let Err(e) = result {
            warn!("Could not remember endpoint: {}", e);
        }
    }
}

fn load_endpoint(storage: &SharedStorage) -> Option<String> {
    match storage.load(ENDPOINT_KEY) {
        Ok(Some(value)) => {
            // Stored as a JSON string; accept a bare string too
            let endpoint = serde_json::from_str::<String>(&value).unwrap_or(value);
            let endpoint = endpoint.trim().to_string();
            (!endpoint.is_empty()).then_some(endpoint)
        }
        Ok(None) => None,
        Err(e) => {
            warn!("Could not read stored endpoint: {}", e);
            None
        }
    }
}

/// Current instant on the tokio clock, which follows paused test time.
fn clock_now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}
