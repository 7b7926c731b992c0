//! Common UI components.
//!
//! This module contains the header bar, status bar, statistics panel and the
//! overlays (fall alert, prompts, help).

use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::centered;
use crate::app::{App, Prompt};
use crate::data::HealthStatus;

/// Render the header bar with connection state and link quality.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let engine = app.engine();
    let state = engine.connection_state();

    let mut spans = vec![
        Span::styled(" ● ", app.theme.connection_style(state)),
        Span::styled("ATHLETE MONITOR ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(state.label(), app.theme.connection_style(state)),
        Span::raw(" │ "),
        Span::raw(engine.endpoint().to_string()),
    ];

    // Quality is a recency heuristic, not a latency measurement
    if let Some(quality) = engine.quality() {
        spans.push(Span::raw(" │ Link "));
        spans.push(Span::styled(quality.label(), app.theme.quality_style(quality)));
    }

    if let Some((attempt, secs)) = app.reconnect_countdown() {
        spans.push(Span::styled(
            format!(" │ Retry #{} in {}s", attempt, secs),
            Style::default().fg(app.theme.warning),
        ));
    } else if let Some(ref message) = app.connection_message {
        spans.push(Span::styled(
            format!(" │ {}", message),
            Style::default().add_modifier(Modifier::DIM),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the status bar at the bottom.
///
/// Shows a temporary status message if one is live, otherwise ingest
/// counters and the available controls.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let counters = app.engine().counters();
    let paused = if app.engine().chart().is_paused() {
        " | CHART PAUSED"
    } else {
        ""
    };
    let status = format!(
        " {} ok, {} dropped{} | c:connect d:disconnect e:json x:csv p:pause C:clear u:endpoint ?:help q:quit",
        counters.accepted,
        counters.dropped(),
        paused
    );

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

fn format_value(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{}{}", v, unit),
        None => "--".to_string(),
    }
}

fn format_time(timestamp: Option<i64>) -> String {
    timestamp
        .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
        .map(|at| at.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--".to_string())
}

/// Render aggregate statistics over the current session buffer.
pub fn render_statistics(frame: &mut Frame, app: &App, area: Rect) {
    let stats = app.engine().statistics();
    let label = Style::default().add_modifier(Modifier::DIM);

    let lines = vec![
        Line::from(vec![
            Span::styled(" Readings   ", label),
            Span::raw(format!(
                "{} / {}",
                stats.total_readings,
                app.engine().session().capacity()
            )),
        ]),
        Line::from(vec![
            Span::styled(" Avg HR     ", label),
            Span::raw(format_value(stats.average_heart_rate, " BPM")),
        ]),
        Line::from(vec![
            Span::styled(" HR range   ", label),
            Span::raw(format!(
                "{} - {}",
                format_value(stats.min_heart_rate, ""),
                format_value(stats.max_heart_rate, "")
            )),
        ]),
        Line::from(vec![
            Span::styled(" Avg SpO2   ", label),
            Span::raw(format_value(stats.average_spo2, "%")),
        ]),
        Line::from(vec![
            Span::styled(" Max squats ", label),
            Span::raw(format_value(stats.max_squat_count, "")),
        ]),
        Line::from(vec![
            Span::styled(" Since      ", label),
            Span::raw(format_time(stats.session_start)),
        ]),
    ];

    let block = Block::default()
        .title(" Session ")
        .title_style(app.theme.header)
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Render the standing fall alert. Stays until dismissed with Esc.
pub fn render_fall_alert(frame: &mut Frame, app: &App, area: Rect) {
    let when = format_time(app.fall_alert);
    let alert = app.theme.status_style(HealthStatus::Critical);

    let text = vec![
        Line::from(""),
        Line::from(Span::styled("FALL DETECTED", alert.add_modifier(Modifier::SLOW_BLINK))),
        Line::from(""),
        Line::from(format!("Reported at {}", when)),
        Line::from(""),
        Line::from(Span::styled(
            "Press Esc to acknowledge",
            Style::default().add_modifier(Modifier::DIM),
        )),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(alert);

    let popup = centered(area, 36, 8);
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(text).alignment(Alignment::Center).block(block),
        popup,
    );
}

/// Render the active prompt (clear confirmation or endpoint editor).
pub fn render_prompt(frame: &mut Frame, app: &App, area: Rect) {
    let (title, lines) = match app.prompt {
        Some(Prompt::ConfirmClear) => (
            " Clear session ",
            vec![
                Line::from(""),
                Line::from("Clear all session data?"),
                Line::from(""),
                Line::from(Span::styled("y: yes   n: no", app.theme.header)),
            ],
        ),
        Some(Prompt::EditEndpoint(ref text)) => (
            " Endpoint ",
            vec![
                Line::from(""),
                Line::from(vec![
                    Span::raw(" > "),
                    Span::styled(text.clone(), Style::default().add_modifier(Modifier::BOLD)),
                    Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
                ]),
                Line::from(""),
                Line::from(Span::styled(
                    " Enter: connect   Esc: cancel",
                    Style::default().add_modifier(Modifier::DIM),
                )),
            ],
        ),
        None => return,
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let popup = centered(area, 48, 7);
    frame.render_widget(Clear, popup);
    frame.render_widget(Paragraph::new(lines).block(block), popup);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the dashboard.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Connection",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  c         Connect"),
        Line::from("  d         Disconnect"),
        Line::from("  u         Edit endpoint"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Session",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  e         Export to JSON"),
        Line::from("  x         Export to CSV"),
        Line::from("  p         Pause/resume chart"),
        Line::from("  C         Clear session"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " General",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  Esc       Dismiss fall alert"),
        Line::from("  q         Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let help_area = centered(area, 40, 22);
    frame.render_widget(Clear, help_area);
    frame.render_widget(Paragraph::new(help_text).block(block), help_area);
}
