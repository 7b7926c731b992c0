//! Telemetry data models and processing.
//!
//! ## Submodules
//!
//! - [`reading`]: Wire payload and the stored [`Reading`]
//! - [`validator`]: Schema check for inbound frames
//! - [`classify`]: Health bands, trends and posture ([`Classifier`])
//! - [`history`]: Rolling chart window
//! - [`session`]: Bounded, persisted session buffer with statistics
//! - [`export`]: JSON and CSV export serialization
//!
//! ## Data Flow
//!
//! ```text
//! raw frame (JSON text)
//!        │
//!        ▼
//! validator::validate()
//!        │
//!        ▼
//! Reading::from_payload()
//!        │
//!        ├──▶ Classifier::assess()   (bands + trends)
//!        ├──▶ ChartWindow::push()    (display cache)
//!        └──▶ SessionStore::record() (buffer + persist)
//! ```

pub mod classify;
pub mod export;
pub mod history;
pub mod reading;
pub mod session;
pub mod validator;

pub use classify::{
    Assessment, Classifier, HealthStatus, HeartRateBand, Posture, Spo2Band, Thresholds, Trend,
};
pub use export::{Export, ExportFormat};
pub use history::{ChartWindow, DEFAULT_CHART_CAPACITY};
pub use reading::{Reading, TelemetryPayload};
pub use session::{
    Confirmation, PersistOutcome, SessionDocument, SessionMetadata, SessionStatistics,
    SessionStore, DEFAULT_CAPACITY, DEFAULT_FALLBACK_RETAIN, SESSION_KEY,
};
