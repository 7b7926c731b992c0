//! Bounded, persisted session of readings.
//!
//! The session is a FIFO ring buffer of validated readings plus metadata. It
//! is written to durable storage after every mutation. When the backend
//! reports a quota failure the buffer is truncated to a smaller tail and
//! the write retried once.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::export::{self, Export, ExportFormat};
use super::reading::Reading;
use crate::error::StorageError;
use crate::storage::SharedStorage;

/// Storage key of the persisted session document.
pub const SESSION_KEY: &str = "athleteMonitorSession";

/// Maximum number of readings kept in a session.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Readings retained after a quota failure.
pub const DEFAULT_FALLBACK_RETAIN: usize = 500;

/// Session metadata. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    /// Arrival time of the first reading. Never overwritten while non-empty.
    pub session_start: Option<i64>,
    pub session_end: Option<i64>,
    /// Current buffer length, not a lifetime counter.
    pub total_readings: usize,
    pub last_update: Option<i64>,
    /// Set only by an explicit export.
    pub export_timestamp: Option<i64>,
}

/// The persisted session document: `{ data, metadata }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    pub data: VecDeque<Reading>,
    pub metadata: SessionMetadata,
}

/// Aggregates over the current buffer. Every field is `None` when empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStatistics {
    pub total_readings: usize,
    /// Rounded mean heart rate over finite values.
    pub average_heart_rate: Option<f64>,
    /// Rounded mean SpO2 over finite values.
    pub average_spo2: Option<f64>,
    pub min_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
    pub max_squat_count: Option<f64>,
    pub session_start: Option<i64>,
    pub last_update: Option<i64>,
}

/// Result of writing the session to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Saved,
    /// Quota hit; the buffer was cut down to `retained` readings and saved.
    Truncated { dropped: usize, retained: usize },
    /// The write failed and the in-memory session is ahead of storage.
    Failed(String),
}

impl PersistOutcome {
    /// User-facing warning, if the outcome needs one.
    pub fn warning(&self) -> Option<String> {
        match self {
            PersistOutcome::Saved => None,
            PersistOutcome::Truncated { dropped, retained } => Some(format!(
                "Storage full: dropped {} oldest readings, keeping {}",
                dropped, retained
            )),
            PersistOutcome::Failed(msg) => Some(format!("Could not save session: {}", msg)),
        }
    }
}

/// Explicit answer to a clear request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Accepted,
    Declined,
}

/// Bounded session buffer backed by durable storage.
#[derive(Debug)]
pub struct SessionStore {
    document: SessionDocument,
    capacity: usize,
    fallback_retain: usize,
    storage: SharedStorage,
}

impl SessionStore {
    /// Open the store, restoring any persisted session.
    ///
    /// A missing or unreadable document yields an empty session.
    pub fn open(storage: SharedStorage, capacity: usize, fallback_retain: usize) -> Self {
        let capacity = capacity.max(1);
        let mut store = Self {
            document: SessionDocument::default(),
            capacity,
            fallback_retain: fallback_retain.clamp(1, capacity),
            storage,
        };

        match store.load() {
            Ok(Some(document)) => {
                store.document = document;
                store.enforce_capacity();
                info!("Restored session with {} readings", store.len());
            }
            Ok(None) => debug!("No stored session, starting empty"),
            Err(e) => warn!("Discarding stored session: {}", e),
        }

        store
    }

    fn load(&self) -> Result<Option<SessionDocument>, StorageError> {
        match self.storage.load(SESSION_KEY)? {
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
            None => Ok(None),
        }
    }

    /// Append a reading, evicting the oldest at capacity, then persist.
    pub fn record(&mut self, reading: Reading) -> PersistOutcome {
        let timestamp = reading.timestamp;
        if self.document.data.is_empty() || self.document.metadata.session_start.is_none() {
            self.document.metadata.session_start = Some(timestamp);
        }

        self.document.data.push_back(reading);
        while self.document.data.len() > self.capacity {
            self.document.data.pop_front();
        }

        self.document.metadata.last_update = Some(timestamp);
        self.document.metadata.total_readings = self.document.data.len();
        self.persist()
    }

    /// Aggregates over the current buffer.
    pub fn statistics(&self) -> SessionStatistics {
        let data = &self.document.data;

        let heart_rates: Vec<f64> =
            data.iter().map(|r| r.heart_rate).filter(|v| v.is_finite()).collect();
        let spo2: Vec<f64> = data.iter().map(|r| r.spo2).filter(|v| v.is_finite()).collect();

        SessionStatistics {
            total_readings: data.len(),
            average_heart_rate: rounded_mean(&heart_rates),
            average_spo2: rounded_mean(&spo2),
            min_heart_rate: heart_rates.iter().copied().reduce(f64::min),
            max_heart_rate: heart_rates.iter().copied().reduce(f64::max),
            max_squat_count: data
                .iter()
                .map(|r| r.squat_count)
                .filter(|v| v.is_finite())
                .reduce(f64::max),
            session_start: self.document.metadata.session_start,
            last_update: self.document.metadata.last_update,
        }
    }

    /// Serialize the session. Returns `Ok(None)` for a CSV export of an
    /// empty session: there is nothing to write.
    pub fn export(
        &mut self,
        format: ExportFormat,
        now: DateTime<Utc>,
    ) -> Result<Option<Export>, StorageError> {
        if format == ExportFormat::Csv && self.is_empty() {
            info!("CSV export skipped: session is empty");
            return Ok(None);
        }

        self.document.metadata.export_timestamp = Some(now.timestamp_millis());
        if let Some(warning) = self.persist().warning() {
            warn!("{}", warning);
        }

        let contents = match format {
            ExportFormat::Json => export::to_json(&self.document, now)?,
            ExportFormat::Csv => export::to_csv(&self.document.data),
        };

        Ok(Some(Export {
            format,
            file_name: export::file_name(format, now),
            contents,
        }))
    }

    /// Reset the session if the caller confirmed. Returns `None` when declined.
    pub fn clear(&mut self, confirmation: Confirmation) -> Option<PersistOutcome> {
        if confirmation == Confirmation::Declined {
            debug!("Session clear declined");
            return None;
        }

        self.document = SessionDocument::default();
        info!("Session cleared");
        Some(self.persist())
    }

    pub fn readings(&self) -> &VecDeque<Reading> {
        &self.document.data
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.document.data.back()
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.document.metadata
    }

    pub fn document(&self) -> &SessionDocument {
        &self.document
    }

    pub fn len(&self) -> usize {
        self.document.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn enforce_capacity(&mut self) {
        if self.document.data.len() > self.capacity {
            self.truncate_to(self.capacity);
        }
        self.document.metadata.total_readings = self.document.data.len();
    }

    /// Keep only the newest `retain` readings. Returns how many were dropped.
    fn truncate_to(&mut self, retain: usize) -> usize {
        let len = self.document.data.len();
        if len <= retain {
            return 0;
        }
        let dropped = len - retain;
        self.document.data.drain(..dropped);
        self.document.metadata.total_readings = self.document.data.len();
        dropped
    }

    fn write(&self) -> Result<(), StorageError> {
        let json = serde_json::to_string(&self.document)?;
        self.storage.save(SESSION_KEY, &json)
    }

    fn persist(&mut self) -> PersistOutcome {
        match self.write() {
            Ok(()) => PersistOutcome::Saved,
            Err(e) if e.is_quota() => {
                warn!("{}; keeping last {} readings", e, self.fallback_retain);
                let dropped = self.truncate_to(self.fallback_retain);
                match self.write() {
                    Ok(()) => PersistOutcome::Truncated {
                        dropped,
                        retained: self.len(),
                    },
                    Err(e) => {
                        error!("Session save failed after truncation: {}", e);
                        PersistOutcome::Failed(e.to_string())
                    }
                }
            }
            Err(e) => {
                error!("Session save failed: {}", e);
                PersistOutcome::Failed(e.to_string())
            }
        }
    }
}

fn rounded_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some((values.iter().sum::<f64>() / values.len() as f64).round())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, Storage};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn reading(i: i64, hr: f64) -> Reading {
        Reading {
            timestamp: 1_714_557_600_000 + i * 1000,
            heart_rate: hr,
            spo2: 97.0,
            squat_count: i as f64,
            posture_status: "GOOD".to_string(),
            finger_detected: true,
            fall_detected: false,
        }
    }

    fn store_with(storage: &MemoryStorage) -> SessionStore {
        SessionStore::open(
            Arc::new(storage.clone()),
            DEFAULT_CAPACITY,
            DEFAULT_FALLBACK_RETAIN,
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap()
    }

    #[test]
    fn record_updates_metadata_and_persists() {
        let storage = MemoryStorage::new();
        let mut store = store_with(&storage);

        assert_eq!(store.record(reading(0, 70.0)), PersistOutcome::Saved);
        assert_eq!(store.record(reading(1, 72.0)), PersistOutcome::Saved);

        let meta = store.metadata();
        assert_eq!(meta.session_start, Some(reading(0, 0.0).timestamp));
        assert_eq!(meta.last_update, Some(reading(1, 0.0).timestamp));
        assert_eq!(meta.total_readings, 2);
        assert!(meta.export_timestamp.is_none());

        let persisted: SessionDocument =
            serde_json::from_str(&storage.get(SESSION_KEY).unwrap()).unwrap();
        assert_eq!(&persisted, store.document());
    }

    #[test]
    fn eviction_is_fifo_at_capacity() {
        let storage = MemoryStorage::new();
        let mut store = store_with(&storage);

        for i in 0..1001 {
            store.record(reading(i, 70.0));
        }

        assert_eq!(store.len(), 1000);
        assert_eq!(store.statistics().total_readings, 1000);
        assert_eq!(store.readings().front(), Some(&reading(1, 70.0)));
        assert_eq!(store.readings().back(), Some(&reading(1000, 70.0)));
    }

    #[test]
    fn session_start_survives_eviction() {
        let storage = MemoryStorage::new();
        let mut store = SessionStore::open(Arc::new(storage), 3, 2);
        for i in 0..5 {
            store.record(reading(i, 70.0));
        }
        assert_eq!(store.metadata().session_start, Some(reading(0, 0.0).timestamp));
        assert_eq!(store.metadata().total_readings, 3);
    }

    #[test]
    fn statistics_on_empty_session() {
        let store = store_with(&MemoryStorage::new());
        let stats = store.statistics();
        assert_eq!(stats, SessionStatistics::default());
    }

    #[test]
    fn statistics_ignore_non_finite_values() {
        let mut store = store_with(&MemoryStorage::new());
        store.record(reading(0, 70.0));
        store.record(reading(1, f64::NAN));
        store.record(reading(2, 81.0));
        store.record(reading(3, 60.0));

        let stats = store.statistics();
        assert_eq!(stats.total_readings, 4);
        assert_eq!(stats.average_heart_rate, Some(70.0));
        assert_eq!(stats.average_spo2, Some(97.0));
        assert_eq!(stats.min_heart_rate, Some(60.0));
        assert_eq!(stats.max_heart_rate, Some(81.0));
        assert_eq!(stats.max_squat_count, Some(3.0));
    }

    #[test]
    fn averages_are_rounded() {
        let mut store = store_with(&MemoryStorage::new());
        store.record(reading(0, 70.0));
        store.record(reading(1, 71.0));
        // 70.5 rounds away from zero
        assert_eq!(store.statistics().average_heart_rate, Some(71.0));
    }

    #[test]
    fn restores_persisted_session() {
        let storage = MemoryStorage::new();
        {
            let mut store = store_with(&storage);
            store.record(reading(0, 70.0));
            store.record(reading(1, 75.0));
        }

        let store = store_with(&storage);
        assert_eq!(store.len(), 2);
        assert_eq!(store.latest(), Some(&reading(1, 75.0)));
    }

    #[test]
    fn corrupt_document_starts_empty() {
        let storage = MemoryStorage::new();
        storage.save(SESSION_KEY, "{not json").unwrap();
        let store = store_with(&storage);
        assert!(store.is_empty());
    }

    #[test]
    fn restored_session_is_capped() {
        let storage = MemoryStorage::new();
        {
            let mut store = SessionStore::open(Arc::new(storage.clone()), 10, 5);
            for i in 0..10 {
                store.record(reading(i, 70.0));
            }
        }
        let store = SessionStore::open(Arc::new(storage), 4, 2);
        assert_eq!(store.len(), 4);
        assert_eq!(store.metadata().total_readings, 4);
        assert_eq!(store.readings().front(), Some(&reading(6, 70.0)));
    }

    #[test]
    fn quota_failure_truncates_and_retries() {
        // Fits roughly four readings but not six
        let single = serde_json::to_string(&reading(0, 70.0)).unwrap().len();
        let storage = MemoryStorage::with_quota(single * 5);
        let mut store = SessionStore::open(Arc::new(storage.clone()), 10, 2);

        let mut outcomes = Vec::new();
        for i in 0..6 {
            outcomes.push(store.record(reading(i, 70.0)));
        }

        let truncated = outcomes
            .iter()
            .find(|o| matches!(o, PersistOutcome::Truncated { .. }))
            .expect("expected a truncation");
        assert!(truncated.warning().is_some());
        assert!(store.len() <= 3);

        let persisted: SessionDocument =
            serde_json::from_str(&storage.get(SESSION_KEY).unwrap()).unwrap();
        assert_eq!(persisted.data, store.readings().clone());
        assert_eq!(persisted.metadata.total_readings, store.len());
    }

    #[test]
    fn quota_failure_after_truncation_is_reported() {
        let storage = MemoryStorage::with_quota(10);
        let mut store = SessionStore::open(Arc::new(storage), 10, 2);
        let outcome = store.record(reading(0, 70.0));
        assert!(matches!(outcome, PersistOutcome::Failed(_)));
        // Still usable in memory
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn json_export_round_trips_data() {
        let storage = MemoryStorage::new();
        let mut store = store_with(&storage);
        for i in 0..5 {
            store.record(reading(i, 70.0 + i as f64));
        }

        let export = store.export(ExportFormat::Json, now()).unwrap().unwrap();
        assert_eq!(export.file_name, "athlete-session-2024-05-01T11-00-00.json");

        let parsed: SessionDocument = serde_json::from_str(&export.contents).unwrap();
        assert_eq!(parsed.data, store.readings().clone());
        assert_eq!(parsed.metadata.export_timestamp, Some(now().timestamp_millis()));

        let persisted: SessionDocument =
            serde_json::from_str(&storage.get(SESSION_KEY).unwrap()).unwrap();
        assert_eq!(parsed.data, persisted.data);
    }

    #[test]
    fn csv_export_of_empty_session_is_a_no_op() {
        let storage = MemoryStorage::new();
        let mut store = store_with(&storage);
        assert!(store.export(ExportFormat::Csv, now()).unwrap().is_none());
        assert!(store.metadata().export_timestamp.is_none());
    }

    #[test]
    fn json_export_of_empty_session_still_produces_a_document() {
        let mut store = store_with(&MemoryStorage::new());
        let export = store.export(ExportFormat::Json, now()).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&export.contents).unwrap();
        assert_eq!(value["data"].as_array().map(|a| a.len()), Some(0));
    }

    #[test]
    fn csv_export_has_one_row_per_reading() {
        let mut store = store_with(&MemoryStorage::new());
        store.record(reading(0, 70.0));
        store.record(reading(1, 71.0));
        let export = store.export(ExportFormat::Csv, now()).unwrap().unwrap();
        assert_eq!(export.contents.lines().count(), 3);
        assert!(export.file_name.ends_with(".csv"));
    }

    #[test]
    fn clear_requires_confirmation() {
        let storage = MemoryStorage::new();
        let mut store = store_with(&storage);
        store.record(reading(0, 70.0));

        assert!(store.clear(Confirmation::Declined).is_none());
        assert_eq!(store.len(), 1);

        assert_eq!(store.clear(Confirmation::Accepted), Some(PersistOutcome::Saved));
        assert!(store.is_empty());
        assert_eq!(store.metadata(), &SessionMetadata::default());

        let persisted: SessionDocument =
            serde_json::from_str(&storage.get(SESSION_KEY).unwrap()).unwrap();
        assert!(persisted.data.is_empty());
    }

    #[test]
    fn new_session_start_after_clear() {
        let mut store = store_with(&MemoryStorage::new());
        store.record(reading(0, 70.0));
        store.clear(Confirmation::Accepted);
        store.record(reading(5, 70.0));
        assert_eq!(store.metadata().session_start, Some(reading(5, 0.0).timestamp));
    }
}
