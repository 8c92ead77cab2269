//! # Edge Sources
//!
//! Producers of pin-change events, standing in for the pin-change interrupts
//! of a microcontroller board.
//!
//! An [`EdgeSource`] runs on its own OS thread and reports every level change
//! to an [`EdgeSink`]. The production sink is [`EdgeDispatcher`], which samples
//! the timer at delivery time and calls the channel's
//! [`on_edge`](super::ChannelCapture::on_edge) handler, so the level and the
//! tick form one snapshot exactly as an interrupt handler would take them.
//!
//! ## Sources
//!
//! - [`SyntheticReceiver`]: emits standard RC frames for bench testing
//! - [`TraceReplay`]: replays a recorded JSON Lines edge trace
//!
//! ## Trace Format
//!
//! One event per line, times in microseconds from the start of the trace:
//!
//! ```text
//! {"channel":0,"level":"high","at_us":0}
//! {"channel":0,"level":"low","at_us":1500}
//! {"channel":1,"level":"high","at_us":1500}
//! {"channel":1,"level":"low","at_us":3000}
//! ```

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::timer::TickSource;
use super::{CaptureBank, ChannelId, PinLevel, CHANNEL_COUNT};
use crate::error::{RcBridgeError, Result};

/// Default RC frame period in microseconds (50 Hz).
pub const DEFAULT_FRAME_PERIOD_US: u32 = 20_000;

/// Receiver of pin-change events.
pub trait EdgeSink: Send + Sync {
    /// Reports that `channel` changed to `level`.
    fn deliver(&self, channel: ChannelId, level: PinLevel);
}

/// Routes edges to the capture units, stamping each with the current tick.
pub struct EdgeDispatcher {
    bank: Arc<CaptureBank>,
    timer: Arc<dyn TickSource>,
}

impl EdgeDispatcher {
    /// Creates a dispatcher feeding `bank` with ticks from `timer`.
    pub fn new(bank: Arc<CaptureBank>, timer: Arc<dyn TickSource>) -> Self {
        Self { bank, timer }
    }
}

impl EdgeSink for EdgeDispatcher {
    fn deliver(&self, channel: ChannelId, level: PinLevel) {
        let now = self.timer.now();
        self.bank.channel(channel).on_edge(level, now);
    }
}

/// A producer of pin-change events.
pub trait EdgeSource: Send {
    /// Short name for log messages.
    fn name(&self) -> &'static str;

    /// Delivers edges to `sink` until the source is exhausted or `stop` is set.
    fn run(self: Box<Self>, sink: Arc<dyn EdgeSink>, stop: Arc<AtomicBool>) -> Result<()>;
}

/// Runs `source` on a dedicated thread.
///
/// # Errors
///
/// Returns error if the thread cannot be spawned.
pub fn spawn_edge_source(
    source: Box<dyn EdgeSource>,
    sink: Arc<dyn EdgeSink>,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<Result<()>>> {
    let name = source.name();
    info!("Starting {} edge source", name);
    let handle = thread::Builder::new()
        .name(format!("edge-{}", name))
        .spawn(move || source.run(sink, stop))?;
    Ok(handle)
}

/// One recorded pin change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeEvent {
    pub channel: ChannelId,
    pub level: PinLevel,
    /// Microseconds from the start of the trace.
    pub at_us: u64,
}

/// Sleeps until `start + offset_us`. Returns `false` if `stop` was set.
fn wait_until(start: Instant, offset_us: u64, stop: &AtomicBool) -> bool {
    if stop.load(Ordering::Relaxed) {
        return false;
    }
    let deadline = start + Duration::from_micros(offset_us);
    let now = Instant::now();
    if deadline > now {
        thread::sleep(deadline - now);
    }
    !stop.load(Ordering::Relaxed)
}

/// Generates RC frames with fixed pulse widths.
///
/// Channels are emitted back to back within each frame, the way a typical
/// receiver multiplexes its outputs: channel 1 rises as channel 0 falls.
///
/// # Examples
///
/// ```
/// use rc_drive_bridge::capture::source::SyntheticReceiver;
///
/// let rx = SyntheticReceiver::new([1_500, 1_500], 20_000).with_frame_limit(10);
/// assert_eq!(rx.frame_events().len(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct SyntheticReceiver {
    pulse_us: [u32; CHANNEL_COUNT],
    frame_period_us: u32,
    frame_limit: Option<u64>,
}

impl SyntheticReceiver {
    /// Creates a receiver emitting `pulse_us` per channel every `frame_period_us`.
    ///
    /// The frame period is raised to fit both pulses if it is too short.
    #[must_use]
    pub fn new(pulse_us: [u32; CHANNEL_COUNT], frame_period_us: u32) -> Self {
        let busy = pulse_us.iter().fold(0u32, |total, &us| total.saturating_add(us));
        Self {
            pulse_us,
            frame_period_us: frame_period_us.max(busy),
            frame_limit: None,
        }
    }

    /// Stops after `frames` frames, leaving both lines low.
    #[must_use]
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Frame period in microseconds.
    #[must_use]
    pub fn frame_period_us(&self) -> u32 {
        self.frame_period_us
    }

    /// Edges of one frame, as offsets from the frame start.
    #[must_use]
    pub fn frame_events(&self) -> Vec<EdgeEvent> {
        let mut events = Vec::with_capacity(CHANNEL_COUNT * 2);
        let mut offset = 0u64;
        for id in ChannelId::ALL {
            let width = u64::from(self.pulse_us[id.index()]);
            events.push(EdgeEvent { channel: id, level: PinLevel::High, at_us: offset });
            offset += width;
            events.push(EdgeEvent { channel: id, level: PinLevel::Low, at_us: offset });
        }
        events
    }
}

impl EdgeSource for SyntheticReceiver {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn run(self: Box<Self>, sink: Arc<dyn EdgeSink>, stop: Arc<AtomicBool>) -> Result<()> {
        let events = self.frame_events();
        let start = Instant::now();
        let mut frame = 0u64;

        while self.frame_limit.map_or(true, |limit| frame < limit) {
            let frame_start = frame * u64::from(self.frame_period_us);
            for event in &events {
                if !wait_until(start, frame_start + event.at_us, &stop) {
                    debug!("Synthetic receiver stopped after {} frames", frame);
                    return Ok(());
                }
                sink.deliver(event.channel, event.level);
            }
            frame += 1;
        }

        info!("Synthetic receiver finished {} frames", frame);
        Ok(())
    }
}

/// Replays a recorded edge trace in real time.
#[derive(Debug, Clone, Default)]
pub struct TraceReplay {
    events: Vec<EdgeEvent>,
}

impl TraceReplay {
    /// Loads a JSON Lines trace from `path`.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or a line is malformed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            RcBridgeError::Trace(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let replay = Self::from_reader(BufReader::new(file))?;
        info!("Loaded {} edges from {}", replay.events.len(), path.display());
        Ok(replay)
    }

    /// Parses a JSON Lines trace. Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Trace` error naming the first malformed line.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut events = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let event: EdgeEvent = serde_json::from_str(trimmed).map_err(|e| {
                RcBridgeError::Trace(format!("line {}: {}", index + 1, e))
            })?;
            events.push(event);
        }
        Ok(Self::from_events(events))
    }

    /// Builds a replay from events in any order.
    #[must_use]
    pub fn from_events(mut events: Vec<EdgeEvent>) -> Self {
        events.sort_by_key(|event| event.at_us);
        Self { events }
    }

    /// Events in replay order.
    #[must_use]
    pub fn events(&self) -> &[EdgeEvent] {
        &self.events
    }

    /// Offset of the last event, in microseconds.
    #[must_use]
    pub fn duration_us(&self) -> u64 {
        self.events.last().map_or(0, |event| event.at_us)
    }
}

impl EdgeSource for TraceReplay {
    fn name(&self) -> &'static str {
        "trace"
    }

    fn run(self: Box<Self>, sink: Arc<dyn EdgeSink>, stop: Arc<AtomicBool>) -> Result<()> {
        let start = Instant::now();
        for (delivered, event) in self.events.iter().enumerate() {
            if !wait_until(start, event.at_us, &stop) {
                debug!("Trace replay stopped after {} edges", delivered);
                return Ok(());
            }
            sink.deliver(event.channel, event.level);
        }
        info!("Trace replay finished ({} edges, {} us)", self.events.len(), self.duration_us());
        Ok(())
    }
}
