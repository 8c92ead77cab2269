//! # Drive Mixer
//!
//! Mixes two validated pulse widths into left/right motor drive values.
//!
//! ## Arcade Mix (default)
//!
//! ```text
//! fwd   = neutral - throttle_width
//! turn  = steering_width - neutral
//! left  = (fwd + turn) * full_scale / min_pulse
//! right = (fwd - turn) * full_scale / min_pulse
//! ```
//!
//! Dividing by the minimum pulse width makes a stick deflection of
//! `min_pulse` ticks from neutral reach full scale. Results are clamped to
//! `-full_scale..=full_scale`.
//!
//! ## Tank Mix
//!
//! Each channel drives one motor directly: `left` from the throttle channel,
//! `right` from the steering channel, both as `neutral - width`.
//!
//! ## Calibration
//!
//! Transmitters and receivers disagree on channel order and direction. If the
//! robot turns when it should drive straight, set `swap_channels`; if a stick
//! acts backwards, set the matching `invert_*` flag.

use serde::{Deserialize, Serialize};

use super::validator::{ChannelValidator, PulseLimits};
use crate::capture::{Tick, CHANNEL_COUNT};

/// Largest drive magnitude accepted by the motor controller.
pub const DEFAULT_FULL_SCALE: i16 = 255;

/// How the two channels combine into motor outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixMode {
    /// Throttle plus/minus steering.
    #[default]
    Arcade,
    /// One channel per motor.
    Tank,
}

/// Channel assignment and sign conventions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MixPolarity {
    /// Use channel 1 as throttle and channel 0 as steering.
    pub swap_channels: bool,
    pub invert_throttle: bool,
    pub invert_steering: bool,
}

/// Signed drive command for the two motors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveCommand {
    pub left: i16,
    pub right: i16,
}

impl DriveCommand {
    /// Both motors stopped.
    pub const STOP: DriveCommand = DriveCommand { left: 0, right: 0 };

    #[must_use]
    pub fn new(left: i16, right: i16) -> Self {
        Self { left, right }
    }

    #[must_use]
    pub fn is_stop(&self) -> bool {
        *self == Self::STOP
    }
}

/// Differential drive mixer.
///
/// # Examples
///
/// ```
/// use rc_drive_bridge::control::mixer::{DriveCommand, Mixer};
/// use rc_drive_bridge::control::validator::PulseLimits;
///
/// let mixer = Mixer::new(&PulseLimits::default(), 255);
///
/// // Both sticks centered
/// assert_eq!(mixer.mix(469, 469), DriveCommand::STOP);
///
/// // Throttle channel at maximum pulse
/// assert_eq!(mixer.mix(782, 469), DriveCommand::new(-255, -255));
/// ```
#[derive(Debug, Clone)]
pub struct Mixer {
    mode: MixMode,
    polarity: MixPolarity,
    neutral: i32,
    divisor: i32,
    full_scale: i32,
    deadband: i32,
}

impl Mixer {
    /// Creates an arcade mixer with default polarity and no deadband.
    ///
    /// `full_scale` is the largest magnitude sent to the motors; negative
    /// values are treated as their magnitude.
    #[must_use]
    pub fn new(limits: &PulseLimits, full_scale: i16) -> Self {
        Self {
            mode: MixMode::Arcade,
            polarity: MixPolarity::default(),
            neutral: i32::from(limits.neutral_pulse),
            divisor: i32::from(limits.min_pulse).max(1),
            full_scale: i32::from(full_scale).abs(),
            deadband: 0,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: MixMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_polarity(mut self, polarity: MixPolarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Treats widths within `deadband` ticks of neutral as neutral.
    #[must_use]
    pub fn with_deadband(mut self, deadband: Tick) -> Self {
        self.deadband = i32::from(deadband);
        self
    }

    #[must_use]
    pub fn mode(&self) -> MixMode {
        self.mode
    }

    #[must_use]
    pub fn polarity(&self) -> MixPolarity {
        self.polarity
    }

    /// Drive command for the current trust state.
    ///
    /// Stops both motors unless every channel is trusted and holds a live
    /// reading. A channel whose credit just reached zero has no reading until
    /// its next pulse, and mixing its zero width would command a full turn.
    #[must_use]
    pub fn drive(&self, channels: &[ChannelValidator; CHANNEL_COUNT]) -> DriveCommand {
        match (channels[0].live_width(), channels[1].live_width()) {
            (Some(ch0), Some(ch1)) => self.mix(ch0, ch1),
            _ => DriveCommand::STOP,
        }
    }

    /// Mixes two pulse widths given in channel order.
    #[must_use]
    pub fn mix(&self, ch0: Tick, ch1: Tick) -> DriveCommand {
        let (throttle, steering) = if self.polarity.swap_channels {
            (ch1, ch0)
        } else {
            (ch0, ch1)
        };

        let fwd = negate_if(self.centered(throttle), self.polarity.invert_throttle);
        let second = self.centered(steering);

        let (left, right) = match self.mode {
            MixMode::Arcade => {
                let turn = negate_if(-second, self.polarity.invert_steering);
                (fwd + turn, fwd - turn)
            }
            MixMode::Tank => (fwd, negate_if(second, self.polarity.invert_steering)),
        };

        DriveCommand::new(self.scale(left), self.scale(right))
    }

    /// `neutral - width`, with the deadband applied.
    fn centered(&self, width: Tick) -> i32 {
        let offset = self.neutral - i32::from(width);
        if offset.abs() <= self.deadband {
            0
        } else {
            offset
        }
    }

    fn scale(&self, raw: i32) -> i16 {
        let scaled = raw * self.full_scale / self.divisor;
        scaled.clamp(-self.full_scale, self.full_scale) as i16
    }
}

#[inline]
fn negate_if(value: i32, negate: bool) -> i32 {
    if negate {
        -value
    } else {
        value
    }
}
