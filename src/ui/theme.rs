//! Theme configuration for the dashboard.
//!
//! Supports light and dark themes with automatic terminal detection.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::data::HealthStatus;
use crate::source::{ConnectionQuality, ConnectionState};

/// Color and style theme for the dashboard.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent color for highlights and active elements.
    pub highlight: Color,
    pub warning: Color,
    pub critical: Color,
    pub healthy: Color,
    pub border: Color,
    /// Style for panel titles.
    pub header: Style,
    /// Heart-rate series and value.
    pub heart_rate: Color,
    /// SpO2 series and value.
    pub spo2: Color,
    pub border_type: BorderType,
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            border: Color::Gray,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            heart_rate: Color::LightRed,
            spo2: Color::LightBlue,
            border_type: BorderType::Rounded,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            border: Color::DarkGray,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            heart_rate: Color::Red,
            spo2: Color::Blue,
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Get style for a health status
    pub fn status_style(&self, status: HealthStatus) -> Style {
        match status {
            HealthStatus::Healthy => Style::default().fg(self.healthy),
            HealthStatus::Warning => Style::default().fg(self.warning),
            HealthStatus::Critical => {
                Style::default().fg(self.critical).add_modifier(Modifier::BOLD)
            }
        }
    }

    pub fn connection_style(&self, state: ConnectionState) -> Style {
        match state {
            ConnectionState::Connected => self.status_style(HealthStatus::Healthy),
            ConnectionState::Connecting => self.status_style(HealthStatus::Warning),
            ConnectionState::Disconnected => Style::default().add_modifier(Modifier::DIM),
            ConnectionState::Error => self.status_style(HealthStatus::Critical),
        }
    }

    pub fn quality_style(&self, quality: ConnectionQuality) -> Style {
        self.status_style(match quality {
            ConnectionQuality::Good => HealthStatus::Healthy,
            ConnectionQuality::Fair => HealthStatus::Warning,
            ConnectionQuality::Poor => HealthStatus::Critical,
        })
    }
}
