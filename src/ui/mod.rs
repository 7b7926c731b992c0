//! Terminal dashboard rendering using ratatui.
//!
//! ## Submodules
//!
//! - [`vitals`]: Current heart rate, SpO2, squats, posture and sensor flags
//! - [`chart`]: Rolling heart-rate / SpO2 chart
//! - [`common`]: Header, status bar, statistics and overlays
//! - [`theme`]: Light/dark theme support with terminal auto-detection
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Header (common::render_header)       │
//! ├──────────────┬───────────────────────┤
//! │ Vitals       │ Chart                 │
//! │ (vitals)     │ (chart::render)       │
//! ├──────────────┤                       │
//! │ Statistics   │                       │
//! ├──────────────┴───────────────────────┤
//! │ Status Bar (common::render_status)   │
//! └──────────────────────────────────────┘
//!         ↑
//!    Overlays rendered on top:
//!    - common::render_fall_alert
//!    - common::render_prompt
//!    - common::render_help
//! ```

pub mod chart;
pub mod common;
pub mod theme;
pub mod vitals;

pub use theme::Theme;

use ratatui::{
    layout::{Constraint, Layout, Rect},
    Frame,
};

use crate::app::App;

/// Render the whole dashboard into `area`.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::vertical([
        Constraint::Length(1), // Header bar
        Constraint::Min(10),   // Content
        Constraint::Length(1), // Status bar
    ])
    .split(area);

    let columns = Layout::horizontal([Constraint::Length(36), Constraint::Min(30)]).split(rows[1]);
    let left = Layout::vertical([Constraint::Min(9), Constraint::Length(8)]).split(columns[0]);

    common::render_header(frame, app, rows[0]);
    vitals::render(frame, app, left[0]);
    common::render_statistics(frame, app, left[1]);
    chart::render(frame, app, columns[1]);
    common::render_status_bar(frame, app, rows[2]);

    if app.fall_alert.is_some() {
        common::render_fall_alert(frame, app, area);
    }
    if app.prompt.is_some() {
        common::render_prompt(frame, app, area);
    }
    if app.show_help {
        common::render_help(frame, app, area);
    }
}

/// Centered rectangle of at most `width` x `height` inside `area`.
pub(crate) fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
