//! Rolling heart-rate / SpO2 chart.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame,
};

use crate::app::App;
use crate::data::ChartWindow;

/// Render both series stacked, each with its own y scale.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let window = app.engine().chart();
    let paused = if window.is_paused() { " (paused)" } else { "" };

    let rows = Layout::vertical([Constraint::Percentage(50), Constraint::Percentage(50)]).split(area);

    let hr = window.heart_rate_points();
    render_series(
        frame,
        app,
        rows[0],
        SeriesSpec {
            title: format!(" Heart rate (BPM){} ", paused),
            color: app.theme.heart_rate,
            floor: 40.0,
            ceiling: 180.0,
        },
        &hr,
        window,
    );

    let spo2 = window.spo2_points();
    render_series(
        frame,
        app,
        rows[1],
        SeriesSpec {
            title: format!(" SpO2 (%){} ", paused),
            color: app.theme.spo2,
            floor: 85.0,
            ceiling: 100.0,
        },
        &spo2,
        window,
    );
}

struct SeriesSpec {
    title: String,
    color: Color,
    /// Default y range, widened to fit outliers.
    floor: f64,
    ceiling: f64,
}

fn render_series(
    frame: &mut Frame,
    app: &App,
    area: Rect,
    spec: SeriesSpec,
    points: &[(f64, f64)],
    window: &ChartWindow,
) {
    let (low, high) = y_bounds(points, spec.floor, spec.ceiling);
    let x_max = window.capacity().saturating_sub(1).max(1) as f64;

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(spec.color))
        .data(points);

    let first = window.labels().front().cloned().unwrap_or_default();
    let last = window.labels().back().cloned().unwrap_or_default();
    let dim = Style::default().add_modifier(Modifier::DIM);

    let chart = Chart::new(vec![dataset])
        .block(
            Block::default()
                .title(spec.title)
                .title_style(app.theme.header)
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .x_axis(
            Axis::default()
                .style(dim)
                .bounds([0.0, x_max])
                .labels(vec![Span::raw(first), Span::raw(last)]),
        )
        .y_axis(
            Axis::default()
                .style(dim)
                .bounds([low, high])
                .labels(vec![
                    Span::raw(format!("{:.0}", low)),
                    Span::raw(format!("{:.0}", high)),
                ]),
        );

    frame.render_widget(chart, area);
}

/// Y range covering `[floor, ceiling]` and every point.
fn y_bounds(points: &[(f64, f64)], floor: f64, ceiling: f64) -> (f64, f64) {
    points.iter().fold((floor, ceiling), |(low, high), &(_, y)| {
        (low.min(y), high.max(y))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_widen_for_outliers() {
        assert_eq!(y_bounds(&[], 40.0, 180.0), (40.0, 180.0));
        assert_eq!(y_bounds(&[(0.0, 35.0), (1.0, 200.0)], 40.0, 180.0), (35.0, 200.0));
    }
}
