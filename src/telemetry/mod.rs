//! # Telemetry Module
//!
//! Status display and JSONL status logging.
//!
//! This module handles:
//! - Formatting the periodic status line (pulse widths in µs, trust state,
//!   drive command)
//! - Converting control snapshots into [`StatusRecord`]s
//! - Writing records as JSON Lines to rotating log files
//! - Retaining only the newest N files

pub mod display;
pub mod logger;
pub mod types;

pub use display::run_status_display;
pub use logger::StatusLogger;
pub use types::{format_status_line, ChannelRecord, StatusRecord};
