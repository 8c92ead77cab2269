//! Status record and display line

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::capture::timer::ticks_to_us;
use crate::capture::CHANNEL_COUNT;
use crate::control::mixer::DriveCommand;
use crate::control::{ChannelStatus, ControlStatus};

/// One channel as logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Live pulse width in microseconds, zero while untrusted
    pub width_us: u32,
    pub error_credit: u8,
    pub trusted: bool,
}

impl ChannelRecord {
    fn from_status(status: &ChannelStatus, tick_period_ns: u32) -> Self {
        Self {
            width_us: ticks_to_us(status.width_ticks, tick_period_ns),
            error_credit: status.error_credit,
            trusted: status.trusted,
        }
    }
}

/// One line of the status log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// RFC 3339 wall clock time
    pub timestamp: String,
    pub uptime_ms: u32,
    pub cycles: u64,
    pub channels: [ChannelRecord; CHANNEL_COUNT],
    pub command: DriveCommand,
}

impl StatusRecord {
    /// Snapshot `status`, stamped with the current time
    pub fn new(status: &ControlStatus, uptime_ms: u32, tick_period_ns: u32) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            uptime_ms,
            cycles: status.cycles,
            channels: [
                ChannelRecord::from_status(&status.channels[0], tick_period_ns),
                ChannelRecord::from_status(&status.channels[1], tick_period_ns),
            ],
            command: status.command,
        }
    }
}

/// Formats the periodic display line.
///
/// A trusted channel shows its width in µs, an untrusted one shows the
/// remaining error credit.
///
/// # Examples
///
/// ```
/// use rc_drive_bridge::control::ControlStatus;
/// use rc_drive_bridge::telemetry::format_status_line;
///
/// let line = format_status_line(&ControlStatus::default(), 1_500, 3_200);
/// assert_eq!(line, "t=1.5s ch0 wait(0) ch1 wait(0) drive L+0 R+0");
/// ```
pub fn format_status_line(status: &ControlStatus, uptime_ms: u32, tick_period_ns: u32) -> String {
    let channel = |c: &ChannelStatus| {
        if c.trusted && c.width_ticks != 0 {
            format!("{}us", ticks_to_us(c.width_ticks, tick_period_ns))
        } else {
            format!("wait({})", c.error_credit)
        }
    };

    format!(
        "t={}.{}s ch0 {} ch1 {} drive L{:+} R{:+}",
        uptime_ms / 1000,
        uptime_ms % 1000 / 100,
        channel(&status.channels[0]),
        channel(&status.channels[1]),
        status.command.left,
        status.command.right,
    )
}
