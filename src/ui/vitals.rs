//! Vitals panel rendering.
//!
//! Shows the latest heart rate and SpO2 with their bands and trend arrows,
//! squat progress, posture and the finger/fall sensor flags.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

use crate::app::{App, SQUAT_TARGET};
use crate::data::{HealthStatus, Trend};

/// Render the vitals panel.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Vitals ")
        .title_style(app.theme.header)
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::vertical([Constraint::Min(5), Constraint::Length(2)]).split(inner);

    frame.render_widget(Paragraph::new(vital_lines(app)), chunks[0]);
    render_squats(frame, app, chunks[1]);
}

fn vital_lines(app: &App) -> Vec<Line<'static>> {
    let label = Style::default().add_modifier(Modifier::DIM);
    let Some((reading, assessment)) = app.engine().latest() else {
        return vec![
            Line::from(""),
            Line::from(Span::styled(" Waiting for data...", label)),
        ];
    };

    let hr_style = app.theme.status_style(assessment.heart_rate.status());
    let spo2_style = app.theme.status_style(assessment.spo2.status());
    let posture_style = assessment
        .posture
        .status()
        .map_or(label, |status| app.theme.status_style(status));

    vec![
        Line::from(vec![
            Span::styled(" Heart rate ", label),
            Span::styled(
                format!("{:>5} BPM ", format_number(reading.heart_rate)),
                Style::default().fg(app.theme.heart_rate).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("{} ", trend_arrow(assessment.heart_rate_trend))),
            Span::styled(assessment.heart_rate.label(), hr_style),
        ]),
        Line::from(vec![
            Span::styled(" SpO2       ", label),
            Span::styled(
                format!("{:>5} %   ", format_number(reading.spo2)),
                Style::default().fg(app.theme.spo2).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("{} ", trend_arrow(assessment.spo2_trend))),
            Span::styled(assessment.spo2.label(), spo2_style),
        ]),
        Line::from(vec![
            Span::styled(" Posture    ", label),
            Span::styled(assessment.posture.label(), posture_style),
        ]),
        Line::from(vec![
            Span::styled(" Finger     ", label),
            flag_span(app, app.finger_detected, "Detected", "Not detected", HealthStatus::Warning),
        ]),
        Line::from(vec![
            Span::styled(" Fall       ", label),
            // Inverted: a detected fall is the bad case
            match app.fall_detected {
                Some(true) => Span::styled("FALL", app.theme.status_style(HealthStatus::Critical)),
                Some(false) => Span::styled("None", app.theme.status_style(HealthStatus::Healthy)),
                None => Span::styled("Unknown", label),
            },
        ]),
    ]
}

fn flag_span(
    app: &App,
    flag: Option<bool>,
    yes: &'static str,
    no: &'static str,
    no_status: HealthStatus,
) -> Span<'static> {
    match flag {
        Some(true) => Span::styled(yes, app.theme.status_style(HealthStatus::Healthy)),
        Some(false) => Span::styled(no, app.theme.status_style(no_status)),
        None => Span::styled("Unknown", Style::default().add_modifier(Modifier::DIM)),
    }
}

fn render_squats(frame: &mut Frame, app: &App, area: Rect) {
    let count = app
        .engine()
        .latest()
        .map(|(reading, _)| format_number(reading.squat_count))
        .unwrap_or_else(|| "--".to_string());

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(app.theme.highlight))
        .ratio(app.squat_progress())
        .label(format!("Squats {} / {}", count, SQUAT_TARGET));

    frame.render_widget(gauge, area);
}

fn trend_arrow(trend: Option<Trend>) -> &'static str {
    trend.map_or(" ", |t| t.arrow())
}

/// Whole numbers without a fraction, NaN as `--`.
fn format_number(value: f64) -> String {
    if !value.is_finite() {
        "--".to_string()
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_drop_trailing_fraction() {
        assert_eq!(format_number(72.0), "72");
        assert_eq!(format_number(97.5), "97.5");
        assert_eq!(format_number(f64::NAN), "--");
    }

    #[test]
    fn missing_trend_renders_blank() {
        assert_eq!(trend_arrow(None), " ");
        assert_eq!(trend_arrow(Some(Trend::Up)), Trend::Up.arrow());
    }
}
