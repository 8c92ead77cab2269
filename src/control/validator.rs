//! # Pulse Validator
//!
//! Per-channel trust filter applied to captured pulses.
//!
//! A channel starts untrusted with a full error credit. Every valid pulse pays
//! back one credit; only once the credit is exhausted does a pulse become the
//! live reading. Any malformed pulse, or a receiver that goes quiet for longer
//! than the stale window, restores the full credit. A single good pulse after a
//! burst of noise therefore never re-enables the motors.
//!
//! ## Validity
//!
//! | Check | Default | Rejected as |
//! |-------|---------|-------------|
//! | low gap >= `min_low` | 3000 ticks (9.6 ms) | [`PulseFault::FrameGapTooShort`] |
//! | high >= `min_pulse` | 156 ticks (0.5 ms) | [`PulseFault::PulseTooShort`] |
//! | high <= `max_pulse` | 782 ticks (2.5 ms) | [`PulseFault::PulseTooLong`] |
//!
//! Both pulse bounds are inclusive.

use std::fmt;

use crate::capture::{PulseSample, Tick};

/// Shortest accepted high pulse (0.5 ms at 3.2 µs/tick).
pub const DEFAULT_MIN_PULSE_TICKS: Tick = 156;
/// Centered stick (1.5 ms).
pub const DEFAULT_NEUTRAL_PULSE_TICKS: Tick = 469;
/// Longest accepted high pulse (2.5 ms).
pub const DEFAULT_MAX_PULSE_TICKS: Tick = 782;
/// Shortest accepted low gap between pulses (9.6 ms).
pub const DEFAULT_MIN_LOW_TICKS: Tick = 3_000;
/// Silence after which a channel is considered lost (112 ms).
pub const DEFAULT_STALE_TICKS: Tick = 35_000;
/// Consecutive valid pulses required to trust a channel again.
pub const DEFAULT_ERROR_CREDIT: u8 = 5;

/// Receiver-specific pulse thresholds, in timer ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseLimits {
    pub min_pulse: Tick,
    pub neutral_pulse: Tick,
    pub max_pulse: Tick,
    /// Low gaps shorter than this reject the pulse.
    ///
    /// 9.6 ms is strict for 20 ms RC frames (a 2.5 ms pulse on a 10 ms frame
    /// would fail) and should be reviewed against the receiver in use.
    pub min_low: Tick,
    pub stale: Tick,
    pub error_credit: u8,
}

impl Default for PulseLimits {
    fn default() -> Self {
        Self {
            min_pulse: DEFAULT_MIN_PULSE_TICKS,
            neutral_pulse: DEFAULT_NEUTRAL_PULSE_TICKS,
            max_pulse: DEFAULT_MAX_PULSE_TICKS,
            min_low: DEFAULT_MIN_LOW_TICKS,
            stale: DEFAULT_STALE_TICKS,
            error_credit: DEFAULT_ERROR_CREDIT,
        }
    }
}

impl PulseLimits {
    /// Checks one sample against the limits.
    ///
    /// # Errors
    ///
    /// Returns the first failed check, in the order of the table above.
    pub fn check(&self, sample: &PulseSample) -> Result<Tick, PulseFault> {
        if sample.low < self.min_low {
            Err(PulseFault::FrameGapTooShort(sample.low))
        } else if sample.high < self.min_pulse {
            Err(PulseFault::PulseTooShort(sample.high))
        } else if sample.high > self.max_pulse {
            Err(PulseFault::PulseTooLong(sample.high))
        } else {
            Ok(sample.high)
        }
    }
}

/// Reason a pulse was rejected. Carries the offending duration in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseFault {
    FrameGapTooShort(Tick),
    PulseTooShort(Tick),
    PulseTooLong(Tick),
}

impl fmt::Display for PulseFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PulseFault::FrameGapTooShort(t) => write!(f, "frame gap too short ({} ticks)", t),
            PulseFault::PulseTooShort(t) => write!(f, "pulse too short ({} ticks)", t),
            PulseFault::PulseTooLong(t) => write!(f, "pulse too long ({} ticks)", t),
        }
    }
}

/// Outcome of validating one pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseVerdict {
    /// Malformed pulse; the credit was reset.
    Rejected(PulseFault),
    /// Valid pulse while still untrusted.
    Recovering { remaining: u8 },
    /// Valid pulse on a trusted channel; the width is live.
    Accepted(Tick),
}

/// Trust state of one channel, owned by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelValidator {
    validated_width: Tick,
    error_credit: u8,
}

impl ChannelValidator {
    /// Creates an untrusted validator with the full credit from `limits`.
    #[must_use]
    pub fn new(limits: &PulseLimits) -> Self {
        Self {
            validated_width: 0,
            error_credit: limits.error_credit,
        }
    }

    /// Last accepted pulse width, zero while untrusted.
    #[must_use]
    pub fn validated_width(&self) -> Tick {
        self.validated_width
    }

    /// Valid pulses still owed before the channel is trusted.
    #[must_use]
    pub fn error_credit(&self) -> u8 {
        self.error_credit
    }

    /// Whether the error credit has been paid back.
    #[must_use]
    pub fn is_trusted(&self) -> bool {
        self.error_credit == 0
    }

    /// Live pulse width, if the channel is trusted and has accepted a pulse
    /// since it regained trust.
    #[must_use]
    pub fn live_width(&self) -> Option<Tick> {
        (self.is_trusted() && self.validated_width != 0).then_some(self.validated_width)
    }

    /// Watchdog: marks the channel untrusted if no edge arrived for longer
    /// than `limits.stale` ticks. Returns `true` if it tripped.
    pub fn check_stale(&mut self, since_edge: Tick, limits: &PulseLimits) -> bool {
        if since_edge > limits.stale {
            self.fault(limits);
            true
        } else {
            false
        }
    }

    /// Applies one captured pulse.
    pub fn validate(&mut self, sample: &PulseSample, limits: &PulseLimits) -> PulseVerdict {
        self.validated_width = 0;

        match limits.check(sample) {
            Err(fault) => {
                self.fault(limits);
                PulseVerdict::Rejected(fault)
            }
            Ok(_) if self.error_credit > 0 => {
                self.error_credit -= 1;
                PulseVerdict::Recovering { remaining: self.error_credit }
            }
            Ok(width) => {
                self.validated_width = width;
                PulseVerdict::Accepted(width)
            }
        }
    }

    fn fault(&mut self, limits: &PulseLimits) {
        self.error_credit = limits.error_credit;
        self.validated_width = 0;
    }
}
