//! # Channel Capture Module
//!
//! Edge capture for the two RC receiver channels.
//!
//! This module handles:
//! - The per-channel capture record written by the edge handler
//! - Wrapping tick arithmetic for pulse durations
//! - Short critical sections for the control loop to read the record
//! - Tick sources ([`timer`]) and edge sources ([`source`])
//!
//! ## Edge Handling
//!
//! An RC receiver emits one high pulse per frame (0.5 ms to 2.5 ms) followed by
//! a long low gap. Every level change is delivered to [`ChannelCapture::on_edge`]
//! together with the timer tick sampled at that moment:
//!
//! | New level | Phase that just ended | Recorded as |
//! |-----------|-----------------------|-------------|
//! | High | low gap | `low_duration` |
//! | Low | high pulse | `high_duration`, `pulse_ready = true` |
//!
//! ## Usage
//!
//! ```
//! use rc_drive_bridge::capture::{ChannelCapture, ChannelId, PinLevel};
//!
//! let capture = ChannelCapture::new(ChannelId::Ch0);
//! capture.on_edge(PinLevel::Low, 1_000);
//! capture.on_edge(PinLevel::High, 4_200); // 3200 ticks of low gap
//! capture.on_edge(PinLevel::Low, 4_669);  // 469 ticks high (1.5 ms)
//!
//! let sample = capture.take_pulse().unwrap();
//! assert_eq!(sample.high, 469);
//! assert_eq!(sample.low, 3_200);
//! assert!(capture.take_pulse().is_none());
//! ```

pub mod source;
pub mod timer;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use timer::TickSource;

/// Hardware timer count. The counter is 16 bits wide and wraps.
pub type Tick = u16;

/// Number of RC channels captured.
pub const CHANNEL_COUNT: usize = 2;

/// Ticks elapsed from `since` to `now`, correct across one counter wrap.
///
/// # Examples
///
/// ```
/// use rc_drive_bridge::capture::elapsed;
///
/// assert_eq!(elapsed(100, 569), 469);
/// // Counter wrapped between the two samples
/// assert_eq!(elapsed(65_500, 433), 469);
/// ```
#[inline]
#[must_use]
pub fn elapsed(since: Tick, now: Tick) -> Tick {
    now.wrapping_sub(since)
}

/// Logic level of an input pin after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinLevel {
    Low,
    High,
}

/// RC input channel identifier.
///
/// In the default wiring channel 0 carries forward/reverse and channel 1
/// carries turning; see [`MixPolarity`](crate::control::mixer::MixPolarity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ChannelId {
    Ch0,
    Ch1,
}

impl ChannelId {
    /// All channels in index order.
    pub const ALL: [ChannelId; CHANNEL_COUNT] = [ChannelId::Ch0, ChannelId::Ch1];

    /// Zero-based channel index.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            ChannelId::Ch0 => 0,
            ChannelId::Ch1 => 1,
        }
    }
}

impl TryFrom<u8> for ChannelId {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(ChannelId::Ch0),
            1 => Ok(ChannelId::Ch1),
            other => Err(format!("channel {} out of range (0-{})", other, CHANNEL_COUNT - 1)),
        }
    }
}

impl From<ChannelId> for u8 {
    fn from(id: ChannelId) -> Self {
        id.index() as u8
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.index())
    }
}

/// State written by a channel's edge handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureRecord {
    /// Tick of the most recent edge.
    pub prev_edge: Tick,
    /// Duration of the most recent low phase.
    pub low_duration: Tick,
    /// Duration of the most recent high phase.
    pub high_duration: Tick,
    /// A high phase finished and has not been consumed yet.
    pub pulse_ready: bool,
}

/// One complete pulse copied out of a capture record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseSample {
    /// High pulse width in ticks.
    pub high: Tick,
    /// Low gap that preceded the pulse, in ticks.
    pub low: Tick,
}

/// Capture unit for one RC channel.
///
/// The edge handler and the control loop share the record through a mutex.
/// Every accessor holds the lock only long enough to copy a few words, so an
/// edge arriving during a read is delayed by at most that copy.
#[derive(Debug)]
pub struct ChannelCapture {
    id: ChannelId,
    record: Mutex<CaptureRecord>,
}

impl ChannelCapture {
    /// Creates an empty capture unit for `id`.
    #[must_use]
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            record: Mutex::new(CaptureRecord::default()),
        }
    }

    /// Channel this unit captures.
    #[must_use]
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Edge handler: records the phase that just ended.
    ///
    /// `level` is the pin level after the transition and `now` the tick sampled
    /// together with it. Does no validation.
    pub fn on_edge(&self, level: PinLevel, now: Tick) {
        let mut record = self.lock();
        let duration = elapsed(record.prev_edge, now);
        match level {
            PinLevel::High => record.low_duration = duration,
            PinLevel::Low => {
                record.high_duration = duration;
                record.pulse_ready = true;
            }
        }
        record.prev_edge = now;
    }

    /// Consumes the pending pulse, if any.
    ///
    /// Clears `pulse_ready` and copies both durations in one critical section.
    pub fn take_pulse(&self) -> Option<PulseSample> {
        let mut record = self.lock();
        if !record.pulse_ready {
            return None;
        }
        record.pulse_ready = false;
        Some(PulseSample {
            high: record.high_duration,
            low: record.low_duration,
        })
    }

    /// Ticks since the last edge on this channel.
    ///
    /// `timer` is sampled while the record is locked, so an edge stored
    /// concurrently can never be newer than the sampled tick.
    #[must_use]
    pub fn ticks_since_edge(&self, timer: &dyn TickSource) -> Tick {
        let record = self.lock();
        elapsed(record.prev_edge, timer.now())
    }

    /// Copy of the whole record, for diagnostics.
    #[must_use]
    pub fn snapshot(&self) -> CaptureRecord {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, CaptureRecord> {
        // Plain integers, always consistent
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The capture units for both channels, shared between the edge threads and
/// the control loop.
#[derive(Debug)]
pub struct CaptureBank {
    channels: [ChannelCapture; CHANNEL_COUNT],
}

impl Default for CaptureBank {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBank {
    /// Creates empty capture units for every channel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: ChannelId::ALL.map(ChannelCapture::new),
        }
    }

    /// Capture unit for `id`.
    #[must_use]
    pub fn channel(&self, id: ChannelId) -> &ChannelCapture {
        &self.channels[id.index()]
    }

    /// Iterates over all capture units in channel order.
    pub fn iter(&self) -> impl Iterator<Item = &ChannelCapture> {
        self.channels.iter()
    }
}
