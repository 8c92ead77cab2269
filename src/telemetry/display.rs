//! Periodic status display task

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use super::logger::StatusLogger;
use super::types::{format_status_line, StatusRecord};
use crate::capture::timer::TickSource;
use crate::control::ControlStatus;

/// Reports the latest control status every `period`.
///
/// Runs independently of the control loop: it only reads the most recent
/// snapshot published on `status`. Each tick logs one display line and, with a
/// `logger`, appends one [`StatusRecord`] on the blocking thread pool. A
/// logger that fails is dropped after a warning. Returns the number of lines reported once `shutdown`
/// turns `true` or its sender is dropped.
pub async fn run_status_display(
    status: watch::Receiver<ControlStatus>,
    timer: Arc<dyn TickSource>,
    tick_period_ns: u32,
    period: Duration,
    mut logger: Option<StatusLogger>,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut lines = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = *status.borrow();
                let uptime_ms = timer.millis();
                info!("{}", format_status_line(&snapshot, uptime_ms, tick_period_ns));
                lines += 1;

                if let Some(mut active) = logger.take() {
                    let record = StatusRecord::new(&snapshot, uptime_ms, tick_period_ns);
                    let written = task::spawn_blocking(move || {
                        let result = active.log(&record);
                        (active, result)
                    })
                    .await;

                    match written {
                        Ok((active, Ok(()))) => logger = Some(active),
                        Ok((_, Err(e))) => warn!("Telemetry logging disabled: {}", e),
                        Err(e) => warn!("Telemetry logging disabled: writer task failed: {}", e),
                    }
                }
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    lines
}
