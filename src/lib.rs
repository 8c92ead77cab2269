//! # RC Drive Bridge Library
//!
//! Drive a two-wheeled robot from a hobby RC receiver.
//!
//! This library decodes two RC PWM channels from pin edges, filters them
//! through a per-channel trust counter and a stale-signal watchdog, and mixes
//! them into left/right motor commands. Any doubt about either channel stops
//! both motors.
//!
//! - [`capture`]: edge timing per channel, tick source, edge sources
//! - [`control`]: watchdog, pulse validator, drive mixer and the control loop
//! - [`motor`]: motor controller output over a serial link
//! - [`telemetry`]: status display and JSONL status logs

pub mod capture;
pub mod config;
pub mod control;
pub mod error;
pub mod motor;
pub mod telemetry;
