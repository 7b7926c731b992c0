use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Prompt};
use crate::data::ExportFormat;

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    // Prompts capture all input
    match app.prompt {
        Some(Prompt::ConfirmClear) => {
            handle_confirm_input(app, key);
            return;
        }
        Some(Prompt::EditEndpoint(_)) => {
            handle_endpoint_input(app, key);
            return;
        }
        None => {}
    }

    match key.code {
        // Quit
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),

        // Connection
        KeyCode::Char('c') => app.connect(),
        KeyCode::Char('d') => app.disconnect(),
        KeyCode::Char('u') => app.start_edit_endpoint(),

        // Export
        KeyCode::Char('e') => app.export(ExportFormat::Json),
        KeyCode::Char('x') => app.export(ExportFormat::Csv),

        // Chart and session
        KeyCode::Char('p') => app.toggle_chart_pause(),
        KeyCode::Char('C') => app.request_clear(),

        // Acknowledge fall alert
        KeyCode::Esc => app.dismiss_fall_alert(),

        // Help
        KeyCode::Char('?') => app.toggle_help(),

        _ => {}
    }
}

/// Handle key input while the clear confirmation is shown
fn handle_confirm_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_clear(true),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.confirm_clear(false),
        _ => {}
    }
}

/// Handle key input while the endpoint editor is open
fn handle_endpoint_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.submit_endpoint(),
        KeyCode::Esc => app.cancel_prompt(),
        KeyCode::Backspace => app.endpoint_pop(),
        KeyCode::Char(c) => app.endpoint_push(c),
        _ => {}
    }
}
