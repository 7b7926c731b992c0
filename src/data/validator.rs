//! Schema check for inbound telemetry messages.
//!
//! Presence and primitive type only. Range checks belong to the classifier.

use serde_json::Value;

use super::reading::TelemetryPayload;
use crate::error::IngestError;

/// Primitive type a wire field must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Number,
    Text,
    Boolean,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldKind::Number => value.is_number(),
            FieldKind::Text => value.is_string(),
            FieldKind::Boolean => value.is_boolean(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            FieldKind::Number => "a number",
            FieldKind::Text => "a string",
            FieldKind::Boolean => "a boolean",
        }
    }
}

/// Required wire fields and their types.
const SCHEMA: &[(&str, FieldKind)] = &[
    ("heartRate", FieldKind::Number),
    ("spO2", FieldKind::Number),
    ("squatCount", FieldKind::Number),
    ("postureStatus", FieldKind::Text),
    ("fingerDetected", FieldKind::Boolean),
    ("fallDetected", FieldKind::Boolean),
];

/// Decode and validate one raw transport frame.
///
/// Frames that are not JSON are [`IngestError::Malformed`]; JSON that misses
/// a field or carries the wrong type is [`IngestError::Schema`].
pub fn validate(raw: &str) -> Result<TelemetryPayload, IngestError> {
    let value: Value =
        serde_json::from_str(raw.trim()).map_err(|e| IngestError::Malformed(e.to_string()))?;
    validate_value(value)
}

/// Validate an already-decoded JSON document.
pub fn validate_value(value: Value) -> Result<TelemetryPayload, IngestError> {
    let Value::Object(map) = value else {
        return Err(IngestError::Schema("expected a JSON object".to_string()));
    };

    for (field, kind) in SCHEMA {
        match map.get(*field) {
            None => return Err(IngestError::Schema(format!("missing field `{}`", field))),
            Some(v) if !kind.matches(v) => {
                return Err(IngestError::Schema(format!(
                    "field `{}` must be {}",
                    field,
                    kind.name()
                )))
            }
            Some(_) => {}
        }
    }

    serde_json::from_value(Value::Object(map)).map_err(|e| IngestError::Schema(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"heartRate":72,"spO2":98,"squatCount":3,"postureStatus":"GOOD","fingerDetected":true,"fallDetected":false}"#;

    #[test]
    fn accepts_complete_payload() {
        let payload = validate(VALID).unwrap();
        assert_eq!(payload.heart_rate, 72.0);
        assert_eq!(payload.spo2, 98.0);
        assert_eq!(payload.squat_count, 3.0);
        assert_eq!(payload.posture_status, "GOOD");
        assert!(payload.finger_detected);
        assert!(!payload.fall_detected);
    }

    #[test]
    fn accepts_out_of_range_values() {
        let raw = r#"{"heartRate":-5,"spO2":140.5,"squatCount":-1,"postureStatus":"sideways","fingerDetected":false,"fallDetected":true}"#;
        assert!(validate(raw).is_ok());
    }

    #[test]
    fn ignores_unknown_extra_fields() {
        let raw = r#"{"heartRate":72,"spO2":98,"squatCount":3,"postureStatus":"GOOD","fingerDetected":true,"fallDetected":false,"battery":80}"#;
        assert!(validate(raw).is_ok());
    }

    #[test]
    fn rejects_missing_fall_detected() {
        let raw = r#"{"heartRate":72,"spO2":98,"squatCount":3,"postureStatus":"GOOD","fingerDetected":true}"#;
        let err = validate(raw).unwrap_err();
        assert_eq!(err, IngestError::Schema("missing field `fallDetected`".to_string()));
    }

    #[test]
    fn rejects_wrong_types() {
        let raw = r#"{"heartRate":"72","spO2":98,"squatCount":3,"postureStatus":"GOOD","fingerDetected":true,"fallDetected":false}"#;
        assert!(matches!(validate(raw), Err(IngestError::Schema(msg)) if msg.contains("heartRate")));

        let raw = r#"{"heartRate":72,"spO2":98,"squatCount":3,"postureStatus":1,"fingerDetected":true,"fallDetected":false}"#;
        assert!(matches!(validate(raw), Err(IngestError::Schema(msg)) if msg.contains("postureStatus")));

        let raw = r#"{"heartRate":72,"spO2":98,"squatCount":3,"postureStatus":"GOOD","fingerDetected":1,"fallDetected":false}"#;
        assert!(matches!(validate(raw), Err(IngestError::Schema(msg)) if msg.contains("fingerDetected")));
    }

    #[test]
    fn rejects_null_fields() {
        let raw = r#"{"heartRate":null,"spO2":98,"squatCount":3,"postureStatus":"GOOD","fingerDetected":true,"fallDetected":false}"#;
        assert!(matches!(validate(raw), Err(IngestError::Schema(_))));
    }

    #[test]
    fn rejects_non_object_documents() {
        assert!(matches!(validate("[72,98,3,\"GOOD\",true,false]"), Err(IngestError::Schema(_))));
        assert!(matches!(validate("42"), Err(IngestError::Schema(_))));
    }

    #[test]
    fn malformed_frames_are_distinguished_from_schema_errors() {
        assert!(matches!(validate("not json"), Err(IngestError::Malformed(_))));
        assert!(matches!(validate("{\"heartRate\":"), Err(IngestError::Malformed(_))));
        assert!(matches!(validate(""), Err(IngestError::Malformed(_))));
    }
}
