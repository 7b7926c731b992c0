//! # athlete-monitor
//!
//! Live athlete telemetry ingestion with a terminal dashboard.
//!
//! A single device streams JSON readings (heart rate, SpO2, squat count,
//! posture and sensor flags) over a WebSocket or TCP connection. The engine
//! validates each message, classifies it into health bands and trends, keeps
//! a bounded persisted session with statistics and exports, and feeds a
//! rolling chart.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         MonitorEngine                        │
//! │  ┌──────────┐   ┌───────────┐   ┌────────────┐               │
//! │  │  source  │──▶│ validator │──▶│ classify   │──┐            │
//! │  │(ws / tcp)│   └───────────┘   └────────────┘  │            │
//! │  └────┬─────┘         │                         ▼            │
//! │       │               ├──────────▶ SessionStore ──▶ storage  │
//! │  reconnect            └──────────▶ ChartWindow               │
//! │  (backoff)                                                   │
//! └───────────────────────────┬──────────────────────────────────┘
//!                             │ MonitorEvent (bus)
//!                             ▼
//!                     app / ui (terminal)
//! ```
//!
//! - **[`source`]**: Transports ([`Connector`] trait) and the
//!   [`ConnectionManager`] lifecycle with exponential backoff
//! - **[`data`]**: Readings, validation, classification, session store,
//!   chart window and export
//! - **[`storage`]**: Durable key/value backends for the session and endpoint
//! - **[`engine`]**: [`MonitorEngine`], the single owner of mutable state
//! - **[`bus`]**: In-order event fan-out to subscribers
//! - **[`app`]** / **[`ui`]**: Terminal dashboard
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use athlete_monitor::{EngineConfig, MemoryStorage, MonitorEngine, NetworkConnector};
//!
//! let mut engine = MonitorEngine::new(
//!     EngineConfig::default(),
//!     Box::new(NetworkConnector),
//!     Arc::new(MemoryStorage::new()),
//! );
//!
//! let raw = r#"{"heartRate":72,"spO2":98,"squatCount":4,
//!              "postureStatus":"GOOD","fingerDetected":true,"fallDetected":false}"#;
//! let assessment = engine.ingest(raw).unwrap();
//! assert_eq!(assessment.heart_rate.label(), "Normal");
//! assert_eq!(engine.statistics().total_readings, 1);
//! ```
//!
//! ### Driving a live connection
//!
//! ```no_run
//! use std::sync::Arc;
//! use athlete_monitor::{EngineConfig, FileStorage, MonitorEngine, NetworkConnector};
//!
//! # tokio_test::block_on(async {
//! let storage = Arc::new(FileStorage::new(".athlete-monitor"));
//! let mut engine = MonitorEngine::new(EngineConfig::default(), Box::new(NetworkConnector), storage);
//! let mut events = engine.subscribe();
//!
//! engine.connect("ws://192.168.4.1:81").unwrap();
//! loop {
//!     engine.step().await;
//!     while let Ok(event) = events.try_recv() {
//!         println!("{:?}", event);
//!     }
//! }
//! # });
//! ```

pub mod app;
pub mod bus;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod events;
pub mod source;
pub mod storage;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use bus::{EventBus, MonitorEvent};
pub use config::Settings;
pub use data::{
    Assessment, Confirmation, ExportFormat, HealthStatus, Reading, SessionStatistics, Thresholds,
};
pub use engine::{EngineConfig, IngestCounters, MonitorEngine};
pub use error::{IngestError, MonitorError, StorageError, TransportError};
pub use source::{
    ConnectionManager, ConnectionQuality, ConnectionState, Connector, Endpoint, NetworkConnector,
    ReconnectPolicy, TransportEvent,
};
pub use storage::{FileStorage, MemoryStorage, SharedStorage, Storage};
