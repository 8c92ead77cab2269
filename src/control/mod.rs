//! # Control Module
//!
//! The polling loop between the capture units and the motors.
//!
//! Each cycle, for every channel in order:
//! 1. **Watchdog**: a channel with no edge for longer than the stale window
//!    loses trust.
//! 2. **Validation**: a pending pulse is consumed and filtered.
//!
//! Then the **mixer** turns the two trust states into a drive command, which
//! stops both motors unless both channels are trusted.
//!
//! [`ControlLoop::step`] runs one synchronous cycle; [`ControlLoop::run`] drives
//! it on a tokio interval and forwards every command to a
//! [`MotorOutput`](crate::motor::MotorOutput).

pub mod mixer;
pub mod validator;

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::capture::timer::TickSource;
use crate::capture::{CaptureBank, ChannelId, Tick, CHANNEL_COUNT};
use crate::motor::MotorOutput;
use mixer::{DriveCommand, Mixer};
use validator::{ChannelValidator, PulseLimits, PulseVerdict};

/// Default control cycle period (1 kHz).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(1_000);

/// Trust state of one channel as seen by the display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    /// Live pulse width in ticks, zero while untrusted.
    pub width_ticks: Tick,
    pub error_credit: u8,
    pub trusted: bool,
}

impl From<&ChannelValidator> for ChannelStatus {
    fn from(validator: &ChannelValidator) -> Self {
        Self {
            width_ticks: validator.validated_width(),
            error_credit: validator.error_credit(),
            trusted: validator.is_trusted(),
        }
    }
}

/// Snapshot published after every control cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ControlStatus {
    pub cycles: u64,
    pub channels: [ChannelStatus; CHANNEL_COUNT],
    pub command: DriveCommand,
}

/// Watchdog, validator and mixer for both channels.
pub struct ControlLoop {
    bank: Arc<CaptureBank>,
    timer: Arc<dyn TickSource>,
    limits: PulseLimits,
    validators: [ChannelValidator; CHANNEL_COUNT],
    mixer: Mixer,
    cycles: u64,
    command: DriveCommand,
}

impl ControlLoop {
    /// Creates a loop with both channels untrusted.
    pub fn new(
        bank: Arc<CaptureBank>,
        timer: Arc<dyn TickSource>,
        limits: PulseLimits,
        mixer: Mixer,
    ) -> Self {
        let validator = ChannelValidator::new(&limits);
        Self {
            bank,
            timer,
            limits,
            validators: [validator; CHANNEL_COUNT],
            mixer,
            cycles: 0,
            command: DriveCommand::STOP,
        }
    }

    /// Trust state of `id`.
    pub fn validator(&self, id: ChannelId) -> &ChannelValidator {
        &self.validators[id.index()]
    }

    /// Runs one cycle and returns the drive command to apply.
    pub fn step(&mut self) -> DriveCommand {
        for id in ChannelId::ALL {
            self.update_channel(id);
        }
        self.cycles += 1;
        self.command = self.mixer.drive(&self.validators);
        self.command
    }

    /// Status after the most recent cycle.
    pub fn status(&self) -> ControlStatus {
        ControlStatus {
            cycles: self.cycles,
            channels: [
                ChannelStatus::from(&self.validators[0]),
                ChannelStatus::from(&self.validators[1]),
            ],
            command: self.command,
        }
    }

    fn update_channel(&mut self, id: ChannelId) {
        let capture = self.bank.channel(id);
        let validator = &mut self.validators[id.index()];
        let was_trusted = validator.is_trusted();

        let since_edge = capture.ticks_since_edge(self.timer.as_ref());
        if validator.check_stale(since_edge, &self.limits) && was_trusted {
            warn!("{} signal lost: no edge for {} ticks", id, since_edge);
        }

        let Some(sample) = capture.take_pulse() else {
            return;
        };

        match validator.validate(&sample, &self.limits) {
            PulseVerdict::Rejected(fault) if was_trusted => {
                warn!("{} untrusted: {}", id, fault);
            }
            PulseVerdict::Rejected(fault) => {
                debug!("{} rejected pulse: {}", id, fault);
            }
            PulseVerdict::Recovering { remaining: 0 } => {
                info!("{} signal trusted", id);
            }
            PulseVerdict::Recovering { .. } | PulseVerdict::Accepted(_) => {}
        }
    }

    /// Runs the loop every `period` until `shutdown` turns `true` or its
    /// sender is dropped.
    ///
    /// Every command goes to `motors`; a failed write is logged and retried on
    /// the next cycle. On shutdown both motors are stopped.
    pub async fn run<M: MotorOutput + ?Sized>(
        mut self,
        motors: &mut M,
        period: Duration,
        status: watch::Sender<ControlStatus>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ControlStatus {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut link_ok = true;

        info!("Control loop running every {} us", period.as_micros());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let command = self.step();
                    match motors.set_motors(command).await {
                        Ok(()) if !link_ok => {
                            info!("Motor output recovered");
                            link_ok = true;
                        }
                        Ok(()) => {}
                        Err(e) if link_ok => {
                            warn!("Motor output failed: {}", e);
                            link_ok = false;
                        }
                        Err(_) => {}
                    }
                    status.send_replace(self.status());
                }

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if let Err(e) = motors.set_motors(DriveCommand::STOP).await {
            warn!("Failed to stop motors on shutdown: {}", e);
        }
        info!("Control loop stopped after {} cycles", self.cycles);
        self.status()
    }
}
