//! # RC Drive Bridge
//!
//! Drive a two-wheeled robot from a hobby RC receiver.
//!
//! Edges from the configured source are time-stamped into the capture units,
//! the control loop turns them into drive commands at 1 kHz, and the status
//! display reports both channels every 100 ms.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use rc_drive_bridge::capture::source::{
    spawn_edge_source, EdgeDispatcher, EdgeSource, SyntheticReceiver, TraceReplay,
};
use rc_drive_bridge::capture::timer::HostTimer;
use rc_drive_bridge::capture::CaptureBank;
use rc_drive_bridge::config::{Config, InputSource, LoggingConfig};
use rc_drive_bridge::control::{ControlLoop, ControlStatus};
use rc_drive_bridge::motor::{DryRunMotors, MotorLink, MotorOutput};
use rc_drive_bridge::telemetry::{run_status_display, StatusLogger};

/// Configuration file used when `--config` is not given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Name of the rolling diagnostic log file
const LOG_FILE_NAME: &str = "rc-drive-bridge.log";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Replay a JSONL edge trace instead of the configured input
    #[arg(long, short)]
    trace: Option<PathBuf>,
}

/// Main entry point for RC Drive Bridge
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration and set up logging
///    - Open the motor controller (or a dry-run output)
///    - Start the edge source thread
///
/// 2. **Run**
///    - Control loop task: watchdog, validation and mixing every cycle
///    - Display task: one status line (and telemetry record) per interval
///
/// 3. **Graceful Shutdown** on Ctrl+C
///    - Stop both tasks; the control loop stops the motors on its way out
///    - Stop the edge source and join its thread
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (config, from_file) = load_config(&args)?;
    let _log_guard = init_logging(&config.logging);

    info!("RC Drive Bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    if !from_file {
        info!("{} not found, using built-in defaults", DEFAULT_CONFIG_PATH);
    }

    let timer = Arc::new(HostTimer::new(config.timer.tick_period_ns));
    let bank = Arc::new(CaptureBank::new());

    let mut motors: Box<dyn MotorOutput> = if config.motor.enabled {
        let link = MotorLink::open(&config.motor.port, config.motor.baud_rate)?;
        info!("Motor controller on {}", link.device_path());
        Box::new(link)
    } else {
        info!("Motor output disabled, logging commands only");
        Box::new(DryRunMotors::new())
    };

    let logger = if config.telemetry.enabled {
        Some(StatusLogger::from_config(&config.telemetry)?)
    } else {
        None
    };

    // Edge source thread
    let stop_edges = Arc::new(AtomicBool::new(false));
    let dispatcher = Arc::new(EdgeDispatcher::new(bank.clone(), timer.clone()));
    let edge_thread = spawn_edge_source(build_edge_source(&config)?, dispatcher, stop_edges.clone())?;

    // Control and display tasks
    let (status_tx, status_rx) = watch::channel(ControlStatus::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let control = ControlLoop::new(bank, timer.clone(), config.pulse_limits(), config.build_mixer());
    let poll_interval = config.poll_interval();
    let control_shutdown = shutdown_rx.clone();
    let control_task = tokio::spawn(async move {
        control.run(&mut *motors, poll_interval, status_tx, control_shutdown).await
    });

    let display_task = tokio::spawn(run_status_display(
        status_rx,
        timer.clone(),
        config.timer.tick_period_ns,
        config.display_interval(),
        logger,
        shutdown_rx,
    ));

    info!("Press Ctrl+C to exit");
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, shutting down...");

    let _ = shutdown_tx.send(true);
    stop_edges.store(true, Ordering::Relaxed);

    let final_status = control_task.await.context("Control task failed")?;
    let lines = display_task.await.context("Display task failed")?;

    match edge_thread.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Edge source failed: {}", e),
        Err(_) => warn!("Edge source thread panicked"),
    }

    info!(
        "Stopped after {} control cycles ({} status lines)",
        final_status.cycles, lines
    );
    Ok(())
}

/// Loads the configuration and applies command line overrides.
///
/// Returns whether a file was read; a missing default file falls back to
/// built-in defaults, any other missing file is an error.
fn load_config(args: &Args) -> Result<(Config, bool)> {
    let use_defaults = args.config == Path::new(DEFAULT_CONFIG_PATH) && !args.config.exists();

    let mut config = if use_defaults {
        Config::default()
    } else {
        Config::load(&args.config)
            .with_context(|| format!("Failed to load {}", args.config.display()))?
    };

    if let Some(trace) = &args.trace {
        config.input.source = InputSource::Trace;
        config.input.trace_path = Some(trace.to_string_lossy().into_owned());
    }
    config.validate()?;

    Ok((config, !use_defaults))
}

/// Stderr logging plus an optional daily rolling file.
///
/// The returned guard must live until exit so buffered file lines are written.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer().with_writer(std::io::stderr);

    match &logging.file_dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_NAME));
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

fn build_edge_source(config: &Config) -> Result<Box<dyn EdgeSource>> {
    match config.input.source {
        InputSource::Synthetic => {
            let [ch0, ch1] = config.input.synthetic_pulse_us;
            info!("Synthetic receiver: ch0 {} us, ch1 {} us", ch0, ch1);
            Ok(Box::new(SyntheticReceiver::new(
                config.input.synthetic_pulse_us,
                config.input.frame_period_us,
            )))
        }
        InputSource::Trace => {
            let path = config
                .input
                .trace_path
                .as_deref()
                .context("trace_path is not set")?;
            let replay = TraceReplay::load(path)
                .with_context(|| format!("Failed to load edge trace {}", path))?;
            info!(
                "Replaying {} edges ({} ms) from {}",
                replay.events().len(),
                replay.duration_us() / 1000,
                path
            );
            Ok(Box::new(replay))
        }
    }
}
