//! Telemetry readings and the inbound wire payload.

use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One telemetry message as sent by the device.
///
/// Only produced by [`validate`](super::validator::validate), so every field is known to
/// be present with the right primitive type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPayload {
    pub heart_rate: f64,
    #[serde(rename = "spO2")]
    pub spo2: f64,
    pub squat_count: f64,
    pub posture_status: String,
    pub finger_detected: bool,
    pub fall_detected: bool,
}

/// A validated telemetry sample stamped with its arrival time.
///
/// The serialized form matches the entries of the persisted session
/// document (`data: Reading[]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Arrival time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Beats per minute.
    pub heart_rate: f64,
    /// Oxygen saturation percentage.
    #[serde(rename = "spO2")]
    pub spo2: f64,
    /// Squat counter as reported by the device. Not assumed monotonic.
    pub squat_count: f64,
    /// Raw posture label (see [`Posture`](super::Posture) for classification).
    pub posture_status: String,
    pub finger_detected: bool,
    pub fall_detected: bool,
}

impl Reading {
    /// Build a reading from a validated payload received at `timestamp` (epoch ms).
    pub fn from_payload(payload: TelemetryPayload, timestamp: i64) -> Self {
        Self {
            timestamp,
            heart_rate: payload.heart_rate,
            spo2: payload.spo2,
            squat_count: payload.squat_count,
            posture_status: payload.posture_status,
            finger_detected: payload.finger_detected,
            fall_detected: payload.fall_detected,
        }
    }

    /// Arrival time as a UTC date, if the timestamp is representable.
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    /// ISO-8601 arrival date with millisecond precision (`2024-05-01T10:00:00.000Z`).
    pub fn iso_date(&self) -> String {
        self.received_at()
            .map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default()
    }

    /// Local wall-clock label (`HH:MM:SS`) used on chart axes.
    pub fn time_label(&self) -> String {
        self.received_at()
            .map(|d| d.with_timezone(&Local).format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> TelemetryPayload {
        TelemetryPayload {
            heart_rate: 72.0,
            spo2: 98.0,
            squat_count: 4.0,
            posture_status: "GOOD".to_string(),
            finger_detected: true,
            fall_detected: false,
        }
    }

    #[test]
    fn from_payload_keeps_all_fields() {
        let reading = Reading::from_payload(payload(), 1_700_000_000_000);
        assert_eq!(reading.timestamp, 1_700_000_000_000);
        assert_eq!(reading.heart_rate, 72.0);
        assert_eq!(reading.spo2, 98.0);
        assert_eq!(reading.squat_count, 4.0);
        assert_eq!(reading.posture_status, "GOOD");
        assert!(reading.finger_detected);
        assert!(!reading.fall_detected);
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let reading = Reading::from_payload(payload(), 0);
        let json = serde_json::to_value(&reading).unwrap();
        assert!(json.get("heartRate").is_some());
        assert!(json.get("spO2").is_some());
        assert!(json.get("squatCount").is_some());
        assert!(json.get("postureStatus").is_some());
        assert!(json.get("fingerDetected").is_some());
        assert!(json.get("fallDetected").is_some());
    }

    #[test]
    fn iso_date_uses_millisecond_utc_format() {
        let reading = Reading::from_payload(payload(), 1_714_557_600_123);
        assert_eq!(reading.iso_date(), "2024-05-01T10:00:00.123Z");
    }
}
