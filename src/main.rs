use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use athlete_monitor::{
    events, ui, App, EngineConfig, ExportFormat, FileStorage, MonitorEngine, MonitorEvent,
    NetworkConnector, Settings,
};

const LOG_FILE: &str = "athlete-monitor.log";

#[derive(Parser, Debug)]
#[command(name = "athlete-monitor")]
#[command(about = "Live athlete telemetry dashboard for heart rate, SpO2, squats and posture")]
struct Args {
    /// Device endpoint, e.g. ws://192.168.4.1:81 or tcp://host:port
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Directory for the persisted session, endpoint and log file
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run without the dashboard and log each reading
    #[arg(long, conflicts_with_all = ["export_json", "export_csv"])]
    headless: bool,

    /// Write the persisted session as JSON to this file and exit
    #[arg(long, conflicts_with = "export_csv")]
    export_json: Option<PathBuf>,

    /// Write the persisted session as CSV to this file and exit
    #[arg(long)]
    export_csv: Option<PathBuf>,

    /// Directory for exports triggered from the dashboard
    #[arg(long, default_value = ".")]
    export_dir: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(ref dir) = args.data_dir {
        settings.data_dir = dir.clone();
    }
    if let Some(ref endpoint) = args.endpoint {
        settings.endpoint = endpoint.clone();
    }

    fs::create_dir_all(&settings.data_dir).with_context(|| {
        format!("Failed to create data directory {}", settings.data_dir.display())
    })?;

    let tui = !args.headless && args.export_json.is_none() && args.export_csv.is_none();
    init_logging(tui.then(|| settings.data_dir.join(LOG_FILE)).as_deref())?;

    let storage = Arc::new(
        FileStorage::new(&settings.data_dir).with_quota(settings.storage.quota_bytes),
    );
    let mut engine = MonitorEngine::new(
        EngineConfig::from(&settings),
        Box::new(NetworkConnector),
        storage,
    );

    // Handle export modes (non-interactive)
    if let Some(ref path) = args.export_json {
        return export_to_file(&mut engine, ExportFormat::Json, path);
    }
    if let Some(ref path) = args.export_csv {
        return export_to_file(&mut engine, ExportFormat::Csv, path);
    }

    let rt = tokio::runtime::Runtime::new()?;

    if args.headless {
        return rt.block_on(run_headless(engine, args.endpoint));
    }

    // Transports spawn onto the runtime while the UI owns the main thread
    let _guard = rt.enter();
    if let Some(ref endpoint) = args.endpoint {
        engine.connect(endpoint)?;
    }
    let app = App::new(engine, args.export_dir, ui::Theme::auto_detect());
    run_tui(app)
}

/// Install the tracing subscriber. Logs go to `log_file` when the terminal
/// belongs to the dashboard, otherwise to stderr.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,athlete_monitor=debug"));

    match log_file {
        Some(path) => {
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
                .init();
        }
    }

    Ok(())
}

/// Write the persisted session to `path`.
fn export_to_file(engine: &mut MonitorEngine, format: ExportFormat, path: &Path) -> Result<()> {
    let written = engine
        .export_to_path(format, path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    if written {
        println!(
            "Exported {} readings to {}",
            engine.session().len(),
            path.display()
        );
    } else {
        println!("No data to export");
    }
    Ok(())
}

/// Run the engine without a UI until Ctrl-C.
async fn run_headless(mut engine: MonitorEngine, endpoint: Option<String>) -> Result<()> {
    let mut events = engine.subscribe();
    match endpoint {
        Some(endpoint) => engine.connect(&endpoint)?,
        None => engine.connect_saved()?,
    };
    info!("Headless mode, press Ctrl-C to stop");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = engine.step() => {}
        }
        while let Ok(event) = events.try_recv() {
            log_event(&event);
        }
    }

    engine.disconnect();
    let stats = engine.statistics();
    info!(
        "Stopped with {} readings in session ({} accepted, {} dropped this run)",
        stats.total_readings,
        engine.counters().accepted,
        engine.counters().dropped()
    );
    Ok(())
}

fn log_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::Reading {
            reading,
            assessment,
        } => info!(
            "HR {} {} {} | SpO2 {} {} {} | squats {} | posture {} | finger {} | overall {}",
            reading.heart_rate,
            assessment.heart_rate.label(),
            assessment.heart_rate_trend.map_or("", |t| t.arrow()),
            reading.spo2,
            assessment.spo2.label(),
            assessment.spo2_trend.map_or("", |t| t.arrow()),
            reading.squat_count,
            assessment.posture.label(),
            reading.finger_detected,
            assessment.overall().symbol()
        ),
        MonitorEvent::ConnectionChanged { state, message } => info!(
            "Connection {}{}",
            state.label(),
            message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default()
        ),
        MonitorEvent::ReconnectScheduled { attempt, delay } => {
            info!("Reconnect #{} in {:?}", attempt, delay)
        }
        MonitorEvent::FallDetected { .. } => error!("FALL DETECTED"),
        MonitorEvent::StorageWarning { message } => warn!("{}", message),
        // Already logged by the engine
        MonitorEvent::Rejected { .. } | MonitorEvent::SessionCleared => {}
    }
}

/// Run the dashboard until the user quits.
fn run_tui(mut app: App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    // Minimum terminal size for usable display
    const MIN_WIDTH: u16 = 72;
    const MIN_HEIGHT: u16 = 18;

    while app.running {
        app.tick();

        terminal.draw(|frame| {
            let area = frame.area();

            if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
                let msg = format!(
                    "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
                    area.width, area.height, MIN_WIDTH, MIN_HEIGHT
                );
                let paragraph = ratatui::widgets::Paragraph::new(msg)
                    .alignment(ratatui::layout::Alignment::Center)
                    .style(ratatui::style::Style::default().fg(ratatui::style::Color::Yellow));
                let centered =
                    ratatui::layout::Rect::new(0, (area.height / 2).saturating_sub(2), area.width, 5)
                        .intersection(area);
                frame.render_widget(paragraph, centered);
                return;
            }

            ui::render(frame, app, area);
        })?;

        if let Some(Event::Key(key)) = events::poll_event(Duration::from_millis(100))? {
            if key.kind == KeyEventKind::Press {
                events::handle_key_event(app, key);
            }
        }
    }

    Ok(())
}
