//! Session export as a JSON document or a flat CSV table.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::reading::Reading;
use super::session::SessionDocument;

/// CSV header row, in column order.
pub const CSV_HEADER: &str =
    "Timestamp,Date,Heart Rate (BPM),SpO2 (%),Squat Count,Posture Status,Finger Detected,Fall Detected";

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "JSON"),
            ExportFormat::Csv => write!(f, "CSV"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("Unknown export format: {}", other)),
        }
    }
}

/// A rendered export ready to be written out.
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub format: ExportFormat,
    /// Suggested file name, stamped with the export instant.
    pub file_name: String,
    pub contents: String,
}

impl Export {
    /// Write to `dir/<file_name>`, creating the directory if needed.
    pub fn write_to_dir(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        self.write_to(&path)?;
        Ok(path)
    }

    /// Write to an explicit path.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.contents.as_bytes())
    }
}

/// Export file name for the given format and instant.
pub fn file_name(format: ExportFormat, now: DateTime<Utc>) -> String {
    format!(
        "athlete-session-{}.{}",
        now.format("%Y-%m-%dT%H-%M-%S"),
        format.extension()
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    #[serde(flatten)]
    document: &'a SessionDocument,
    export_timestamp: i64,
    export_date: String,
}

/// Pretty-printed session document plus `exportTimestamp` / `exportDate`.
pub fn to_json(document: &SessionDocument, now: DateTime<Utc>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonExport {
        document,
        export_timestamp: now.timestamp_millis(),
        export_date: now.to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// One quoted CSV row for a reading.
pub fn csv_row(reading: &Reading) -> String {
    let fields = [
        reading.timestamp.to_string(),
        reading.iso_date(),
        reading.heart_rate.to_string(),
        reading.spo2.to_string(),
        reading.squat_count.to_string(),
        reading.posture_status.clone(),
        yes_no(reading.finger_detected).to_string(),
        yes_no(reading.fall_detected).to_string(),
    ];
    fields.iter().map(|f| quote(f)).collect::<Vec<_>>().join(",")
}

/// Header plus one row per reading, newline separated.
pub fn to_csv<'a>(readings: impl IntoIterator<Item = &'a Reading>) -> String {
    let mut out = String::from(CSV_HEADER);
    for reading in readings {
        out.push('\n');
        out.push_str(&csv_row(reading));
    }
    out
}
