//! Error types for the monitoring engine.
//!
//! None of these are fatal to the engine: transport errors feed the
//! reconnection policy, ingest errors drop a single message and storage
//! errors degrade persistence.

use thiserror::Error;

/// Errors raised while opening or running a transport session.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint string could not be parsed as `scheme://host:port`.
    #[error("Invalid endpoint '{0}': expected scheme://host:port")]
    InvalidEndpoint(String),

    /// The endpoint scheme has no transport implementation.
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// No async runtime was available to drive the transport.
    #[error("Transport runtime unavailable: {0}")]
    Runtime(String),
}

/// Errors raised by a durable storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The write would exceed the backend's quota.
    #[error("Storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    /// Underlying I/O failure.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document could not be (de)serialized.
    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Whether this error is a quota failure (the one the session store recovers from).
    pub fn is_quota(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

/// Reasons an inbound payload is rejected before it becomes a reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    /// The frame is not decodable as a JSON document.
    #[error("Malformed frame: {0}")]
    Malformed(String),

    /// The document decoded but does not match the telemetry schema.
    #[error("Schema violation: {0}")]
    Schema(String),
}

/// Top-level error type for engine operations.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// User supplied an empty endpoint.
    #[error("Endpoint must not be empty")]
    EmptyEndpoint,

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Writing an export file failed.
    #[error("Export failed: {0}")]
    Export(#[from] std::io::Error),
}
