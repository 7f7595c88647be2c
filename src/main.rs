// conntop - live TCP connection monitor
// A ranked, scrollable table of active connections and their throughput

mod app;
mod error;
mod export;
mod net;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::config::{DEFAULT_CLOSED_TIMEOUT_SECS, DEFAULT_EXPORT_PATH, DEFAULT_POLL_MS, DEFAULT_TICK_MS};
use app::engine::CrosstermSurface;
use app::{DisplayEngine, EngineConfig, TrackerConfig};
use clap::Parser;
use net::procfs::ProcTracker;
use net::ConnectionTable;
use std::fs::File;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::{prelude::*, EnvFilter};

/// conntop: live table of TCP connections
#[derive(Parser, Debug)]
#[command(name = "conntop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File the JSON connection snapshot is written to on every refresh
    #[arg(long, default_value = DEFAULT_EXPORT_PATH)]
    export: PathBuf,

    /// Do not write the JSON snapshot
    #[arg(long)]
    no_export: bool,

    /// Input poll timeout per refresh, in milliseconds
    #[arg(long, default_value_t = DEFAULT_TICK_MS)]
    tick_ms: u64,

    /// Interval between kernel socket table polls, in milliseconds
    #[arg(long, default_value_t = DEFAULT_POLL_MS)]
    poll_ms: u64,

    /// Seconds closed connections stay listed
    #[arg(long, default_value_t = DEFAULT_CLOSED_TIMEOUT_SECS)]
    closed_timeout: u64,

    /// Log file path (default: <tmp>/conntop.log)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        let export = (!self.no_export).then(|| self.export.clone());
        EngineConfig::new()
            .with_tick_ms(self.tick_ms)
            .with_export_path(export)
    }

    fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            poll_interval: Duration::from_millis(self.poll_ms.max(1)),
            closed_timeout: Duration::from_secs(self.closed_timeout),
        }
    }
}

/// Log to a file; stdout belongs to the table
fn init_logging(cli: &Cli) -> Result<()> {
    let path = cli
        .log_file
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("conntop.log"));
    let log_file = File::create(&path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false)
                .with_target(false),
        )
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;
    tracing::info!("Starting conntop");

    let table = Arc::new(ConnectionTable::new());
    let mut tracker = ProcTracker::spawn(Arc::clone(&table), cli.tracker_config())
        .context("cannot start connection tracker")?;

    // 'q' in the table only asks for shutdown; this thread performs it
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
    let mut engine = DisplayEngine::new(
        table,
        move || {
            let _ = shutdown_tx.send(());
        },
        cli.engine_config(),
    );

    let surface = CrosstermSurface::open()?;
    engine.start(surface)?;

    loop {
        match shutdown_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) if engine.render_thread_exited() => {
                tracing::error!("Display thread exited unexpectedly");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    engine.stop();
    tracker.stop();
    tracing::info!("Goodbye!");
    Ok(())
}
