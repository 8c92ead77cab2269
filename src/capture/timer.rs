//! # Tick Sources
//!
//! The free-running timer that edge handlers and the watchdog sample.
//!
//! On a 20 MHz AVR with Timer1 prescaled by 64 the counter runs at 20 MHz / 64, one tick every 3.2 µs,
//! which resolves a 0.5 ms to 2.5 ms pulse into 156 to 782 ticks. [`HostTimer`]
//! emulates that counter from the host's monotonic clock.

use std::time::{Duration, Instant};

use super::Tick;

/// Default timer resolution in nanoseconds (3.2 µs per tick).
pub const DEFAULT_TICK_PERIOD_NS: u32 = 3_200;

/// Source of timer ticks and uptime.
#[cfg_attr(test, mockall::automock)]
pub trait TickSource: Send + Sync {
    /// Current tick count. Wraps at the counter width.
    fn now(&self) -> Tick;

    /// Milliseconds since the source started. Used for status display only.
    fn millis(&self) -> u32;
}

/// Tick counter derived from [`Instant`].
///
/// # Examples
///
/// ```
/// use rc_drive_bridge::capture::timer::{HostTimer, TickSource};
///
/// let timer = HostTimer::new(3_200);
/// let a = timer.now();
/// let b = timer.now();
/// assert!(rc_drive_bridge::capture::elapsed(a, b) < 1_000);
/// ```
#[derive(Debug, Clone)]
pub struct HostTimer {
    start: Instant,
    tick_period_ns: u32,
}

impl Default for HostTimer {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_PERIOD_NS)
    }
}

impl HostTimer {
    /// Creates a timer starting at tick 0 now.
    ///
    /// A zero period is raised to 1 ns.
    #[must_use]
    pub fn new(tick_period_ns: u32) -> Self {
        Self {
            start: Instant::now(),
            tick_period_ns: tick_period_ns.max(1),
        }
    }

    /// Timer resolution in nanoseconds.
    #[must_use]
    pub fn tick_period_ns(&self) -> u32 {
        self.tick_period_ns
    }

    fn uptime(&self) -> Duration {
        self.start.elapsed()
    }
}

impl TickSource for HostTimer {
    fn now(&self) -> Tick {
        let ticks = self.uptime().as_nanos() / u128::from(self.tick_period_ns);
        // Truncation to the counter width is the wrap
        ticks as Tick
    }

    fn millis(&self) -> u32 {
        self.uptime().as_millis() as u32
    }
}

/// Converts a tick count to microseconds.
///
/// # Examples
///
/// ```
/// use rc_drive_bridge::capture::timer::ticks_to_us;
///
/// // 3.2 µs per tick: ticks * 32 / 10
/// assert_eq!(ticks_to_us(469, 3_200), 1_500);
/// ```
#[must_use]
pub fn ticks_to_us(ticks: Tick, tick_period_ns: u32) -> u32 {
    (u64::from(ticks) * u64::from(tick_period_ns) / 1_000) as u32
}

/// Converts microseconds to ticks, rounding to the nearest tick.
///
/// Saturates at the counter maximum.
///
/// # Examples
///
/// ```
/// use rc_drive_bridge::capture::timer::us_to_ticks;
///
/// assert_eq!(us_to_ticks(1_500, 3_200), 469);
/// assert_eq!(us_to_ticks(9_600, 3_200), 3_000);
/// ```
#[must_use]
pub fn us_to_ticks(us: u32, tick_period_ns: u32) -> Tick {
    let period = u64::from(tick_period_ns.max(1));
    let ticks = (u64::from(us) * 1_000 + period / 2) / period;
    ticks.min(u64::from(Tick::MAX)) as Tick
}
