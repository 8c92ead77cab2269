//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and every field has a default, so an empty file (or no file
//! at all, see [`Config::default`]) yields standard RC receiver thresholds.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::capture::timer::DEFAULT_TICK_PERIOD_NS;
use crate::capture::source::DEFAULT_FRAME_PERIOD_US;
use crate::capture::CHANNEL_COUNT;
use crate::control::mixer::{MixMode, MixPolarity, Mixer, DEFAULT_FULL_SCALE};
use crate::control::validator::{
    PulseLimits, DEFAULT_ERROR_CREDIT, DEFAULT_MAX_PULSE_TICKS, DEFAULT_MIN_LOW_TICKS,
    DEFAULT_MIN_PULSE_TICKS, DEFAULT_NEUTRAL_PULSE_TICKS, DEFAULT_STALE_TICKS,
};
use crate::error::{RcBridgeError, Result};
use crate::motor::DEFAULT_BAUD_RATE;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub timer: TimerConfig,
    pub pulse: PulseConfig,
    pub mixer: MixerConfig,
    pub control: ControlConfig,
    pub display: DisplayConfig,
    pub motor: MotorConfig,
    pub input: InputConfig,
    pub telemetry: TelemetryConfig,
    pub logging: LoggingConfig,
}

/// Capture timer configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TimerConfig {
    /// Length of one tick in nanoseconds
    #[serde(default = "default_tick_period_ns")]
    pub tick_period_ns: u32,
}

/// Pulse thresholds, all in timer ticks
#[derive(Debug, Deserialize, Clone)]
pub struct PulseConfig {
    #[serde(default = "default_min_pulse_ticks")]
    pub min_pulse_ticks: u16,

    #[serde(default = "default_neutral_pulse_ticks")]
    pub neutral_pulse_ticks: u16,

    #[serde(default = "default_max_pulse_ticks")]
    pub max_pulse_ticks: u16,

    #[serde(default = "default_min_low_ticks")]
    pub min_low_ticks: u16,

    #[serde(default = "default_stale_ticks")]
    pub stale_ticks: u16,

    #[serde(default = "default_error_credit")]
    pub error_credit: u8,
}

/// Drive mixer configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MixerConfig {
    #[serde(default = "default_full_scale")]
    pub full_scale: i16,

    #[serde(default)]
    pub mode: MixMode,

    #[serde(default)]
    pub swap_channels: bool,

    #[serde(default)]
    pub invert_throttle: bool,

    #[serde(default)]
    pub invert_steering: bool,

    #[serde(default)]
    pub deadband_ticks: u16,
}

/// Control loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControlConfig {
    #[serde(default = "default_poll_interval_us")]
    pub poll_interval_us: u64,
}

/// Status display configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_display_interval_ms")]
    pub interval_ms: u64,
}

/// Motor controller link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MotorConfig {
    /// When false, commands are only logged
    #[serde(default = "default_motor_enabled")]
    pub enabled: bool,

    #[serde(default = "default_motor_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Where edges come from
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    /// Generated RC frames at fixed pulse widths
    #[default]
    Synthetic,
    /// Recorded edge trace
    Trace,
}

/// Edge source configuration
#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    #[serde(default)]
    pub source: InputSource,

    #[serde(default)]
    pub trace_path: Option<String>,

    #[serde(default = "default_synthetic_pulse_us")]
    pub synthetic_pulse_us: [u32; CHANNEL_COUNT],

    #[serde(default = "default_frame_period_us")]
    pub frame_period_us: u32,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Diagnostic log configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for a daily rolling log file; stderr only when unset
    #[serde(default)]
    pub file_dir: Option<String>,
}

// Default value functions
fn default_tick_period_ns() -> u32 { DEFAULT_TICK_PERIOD_NS }

fn default_min_pulse_ticks() -> u16 { DEFAULT_MIN_PULSE_TICKS }
fn default_neutral_pulse_ticks() -> u16 { DEFAULT_NEUTRAL_PULSE_TICKS }
fn default_max_pulse_ticks() -> u16 { DEFAULT_MAX_PULSE_TICKS }
fn default_min_low_ticks() -> u16 { DEFAULT_MIN_LOW_TICKS }
fn default_stale_ticks() -> u16 { DEFAULT_STALE_TICKS }
fn default_error_credit() -> u8 { DEFAULT_ERROR_CREDIT }

fn default_full_scale() -> i16 { DEFAULT_FULL_SCALE }

fn default_poll_interval_us() -> u64 { 1000 }
fn default_display_interval_ms() -> u64 { 100 }

fn default_motor_enabled() -> bool { true }
fn default_motor_port() -> String { "/dev/ttyACM0".to_string() }
fn default_baud_rate() -> u32 { DEFAULT_BAUD_RATE }

fn default_synthetic_pulse_us() -> [u32; CHANNEL_COUNT] { [1500, 1500] }
fn default_frame_period_us() -> u32 { DEFAULT_FRAME_PERIOD_US }

fn default_telemetry_enabled() -> bool { false }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_format() -> String { "jsonl".to_string() }

impl Default for TimerConfig {
    fn default() -> Self {
        Self { tick_period_ns: default_tick_period_ns() }
    }
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            min_pulse_ticks: default_min_pulse_ticks(),
            neutral_pulse_ticks: default_neutral_pulse_ticks(),
            max_pulse_ticks: default_max_pulse_ticks(),
            min_low_ticks: default_min_low_ticks(),
            stale_ticks: default_stale_ticks(),
            error_credit: default_error_credit(),
        }
    }
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            full_scale: default_full_scale(),
            mode: MixMode::default(),
            swap_channels: false,
            invert_throttle: false,
            invert_steering: false,
            deadband_ticks: 0,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self { poll_interval_us: default_poll_interval_us() }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { interval_ms: default_display_interval_ms() }
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            enabled: default_motor_enabled(),
            port: default_motor_port(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            source: InputSource::default(),
            trace_path: None,
            synthetic_pulse_us: default_synthetic_pulse_us(),
            frame_period_us: default_frame_period_us(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            format: default_log_format(),
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> RcBridgeError {
    RcBridgeError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rc_drive_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns `Config` error if parsing or validation fails
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Pulse thresholds for the validator and mixer
    pub fn pulse_limits(&self) -> PulseLimits {
        PulseLimits {
            min_pulse: self.pulse.min_pulse_ticks,
            neutral_pulse: self.pulse.neutral_pulse_ticks,
            max_pulse: self.pulse.max_pulse_ticks,
            min_low: self.pulse.min_low_ticks,
            stale: self.pulse.stale_ticks,
            error_credit: self.pulse.error_credit,
        }
    }

    /// Mixer built from the `[pulse]` and `[mixer]` sections
    pub fn build_mixer(&self) -> Mixer {
        Mixer::new(&self.pulse_limits(), self.mixer.full_scale)
            .with_mode(self.mixer.mode)
            .with_polarity(MixPolarity {
                swap_channels: self.mixer.swap_channels,
                invert_throttle: self.mixer.invert_throttle,
                invert_steering: self.mixer.invert_steering,
            })
            .with_deadband(self.mixer.deadband_ticks)
    }

    /// Control loop period
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.control.poll_interval_us)
    }

    /// Status display period
    pub fn display_interval(&self) -> Duration {
        Duration::from_millis(self.display.interval_ms)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns `Config` error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.timer.tick_period_ns == 0 {
            return Err(invalid("tick_period_ns must be greater than 0"));
        }

        // Pulse thresholds
        let pulse = &self.pulse;
        if pulse.min_pulse_ticks == 0 {
            return Err(invalid("min_pulse_ticks must be greater than 0"));
        }

        if pulse.min_pulse_ticks >= pulse.neutral_pulse_ticks
            || pulse.neutral_pulse_ticks >= pulse.max_pulse_ticks
        {
            return Err(invalid(
                "pulse ticks must satisfy min_pulse_ticks < neutral_pulse_ticks < max_pulse_ticks",
            ));
        }

        if pulse.stale_ticks == 0 {
            return Err(invalid("stale_ticks must be greater than 0"));
        }

        if pulse.error_credit == 0 {
            return Err(invalid("error_credit must be at least 1"));
        }

        // Mixer
        if self.mixer.full_scale < 1 {
            return Err(invalid(format!("full_scale must be between 1 and {}", i16::MAX)));
        }

        if self.mixer.deadband_ticks >= pulse.neutral_pulse_ticks - pulse.min_pulse_ticks {
            return Err(invalid(
                "deadband_ticks must be less than neutral_pulse_ticks - min_pulse_ticks",
            ));
        }

        // Timing
        if !(100..=100_000).contains(&self.control.poll_interval_us) {
            return Err(invalid("poll_interval_us must be between 100 and 100000"));
        }

        if !(1..=60_000).contains(&self.display.interval_ms) {
            return Err(invalid("display interval_ms must be between 1 and 60000"));
        }

        // Motor link
        if self.motor.enabled && self.motor.port.is_empty() {
            return Err(invalid("motor port cannot be empty when enabled"));
        }

        if ![9600, 19200, 38400, 57600, 115200].contains(&self.motor.baud_rate) {
            return Err(invalid("baud_rate must be one of: 9600, 19200, 38400, 57600, 115200"));
        }

        // Input
        if self.input.source == InputSource::Trace
            && self.input.trace_path.as_deref().map_or(true, str::is_empty)
        {
            return Err(invalid("trace_path is required when input source is 'trace'"));
        }

        if self.input.frame_period_us == 0 {
            return Err(invalid("frame_period_us must be greater than 0"));
        }

        let busy_us = self
            .input
            .synthetic_pulse_us
            .iter()
            .fold(0u32, |total, &us| total.saturating_add(us));
        if busy_us >= self.input.frame_period_us {
            return Err(invalid(
                "synthetic_pulse_us must add up to less than frame_period_us",
            ));
        }

        // Telemetry
        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.format != "jsonl" {
            return Err(invalid("log format must be 'jsonl' (only supported format)"));
        }

        if matches!(self.logging.file_dir.as_deref(), Some("")) {
            return Err(invalid("logging file_dir cannot be empty when set"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::mixer::DriveCommand;

    fn create_valid_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_default_config() {
        let config = create_valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.pulse_limits(), PulseLimits::default());
        assert_eq!(config.poll_interval(), Duration::from_micros(1000));
        assert_eq!(config.display_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.timer.tick_period_ns, 3200);
        assert_eq!(config.pulse.stale_ticks, 35000);
        assert_eq!(config.mixer.mode, MixMode::Arcade);
        assert_eq!(config.input.source, InputSource::Synthetic);
        assert!(config.motor.enabled);
        assert!(!config.telemetry.enabled);
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[pulse]
error_credit = 3

[mixer]
mode = "tank"
invert_throttle = true

[motor]
port = "/dev/ttyUSB0"
baud_rate = 57600

[input]
source = "trace"
trace_path = "traces/bench.jsonl"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.pulse.error_credit, 3);
        assert_eq!(config.pulse.min_pulse_ticks, 156);
        assert_eq!(config.mixer.mode, MixMode::Tank);
        assert!(config.mixer.invert_throttle);
        assert_eq!(config.motor.port, "/dev/ttyUSB0");
        assert_eq!(config.input.source, InputSource::Trace);
        assert_eq!(config.input.trace_path.as_deref(), Some("traces/bench.jsonl"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        match Config::load("/nonexistent/rc-drive-bridge.toml") {
            Err(RcBridgeError::Io(_)) => {}
            other => panic!("Expected Io error, got: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_mix_mode_rejected() {
        let result = Config::from_toml("[mixer]\nmode = \"skid\"\n");
        assert!(matches!(result, Err(RcBridgeError::Config(_))));
    }

    #[test]
    fn test_build_mixer_applies_polarity() {
        let mut config = create_valid_config();
        config.mixer.invert_throttle = true;
        let mixer = config.build_mixer();

        assert!(mixer.polarity().invert_throttle);
        assert_eq!(mixer.mix(782, 469), DriveCommand::new(255, 255));
    }

    #[test]
    fn test_tick_period_zero() {
        let mut config = create_valid_config();
        config.timer.tick_period_ns = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_pulse_zero() {
        let mut config = create_valid_config();
        config.pulse.min_pulse_ticks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_neutral_not_above_min() {
        let mut config = create_valid_config();
        config.pulse.neutral_pulse_ticks = config.pulse.min_pulse_ticks;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_not_above_neutral() {
        let mut config = create_valid_config();
        config.pulse.max_pulse_ticks = 400;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stale_ticks_zero() {
        let mut config = create_valid_config();
        config.pulse.stale_ticks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_error_credit_zero() {
        let mut config = create_valid_config();
        config.pulse.error_credit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_full_scale_zero() {
        let mut config = create_valid_config();
        config.mixer.full_scale = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_full_scale_negative() {
        let mut config = create_valid_config();
        config.mixer.full_scale = -255;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deadband_too_wide() {
        let mut config = create_valid_config();
        config.mixer.deadband_ticks = 313; // neutral - min
        assert!(config.validate().is_err());

        config.mixer.deadband_ticks = 312;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_poll_interval_too_short() {
        let mut config = create_valid_config();
        config.control.poll_interval_us = 99;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval_too_long() {
        let mut config = create_valid_config();
        config.control.poll_interval_us = 100_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_display_interval_zero() {
        let mut config = create_valid_config();
        config.display.interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_display_interval_too_high() {
        let mut config = create_valid_config();
        config.display.interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_motor_port_when_enabled() {
        let mut config = create_valid_config();
        config.motor.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_motor_port_when_disabled() {
        let mut config = create_valid_config();
        config.motor.enabled = false;
        config.motor.port = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = create_valid_config();
        config.motor.baud_rate = 420000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_baud_rates() {
        for baud in [9600, 19200, 38400, 57600, 115200] {
            let mut config = create_valid_config();
            config.motor.baud_rate = baud;
            assert!(config.validate().is_ok(), "baud {} should be valid", baud);
        }
    }

    #[test]
    fn test_trace_source_without_path() {
        let mut config = create_valid_config();
        config.input.source = InputSource::Trace;
        assert!(config.validate().is_err());

        config.input.trace_path = Some(String::new());
        assert!(config.validate().is_err());

        config.input.trace_path = Some("trace.jsonl".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_frame_period_zero() {
        let mut config = create_valid_config();
        config.input.frame_period_us = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_synthetic_pulse_longer_than_frame() {
        let mut config = create_valid_config();
        config.input.synthetic_pulse_us = [1500, 20_000];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_synthetic_pulses_must_fit_frame_together() {
        let mut config = create_valid_config();
        config.input.synthetic_pulse_us = [12_000, 8_000];
        assert!(config.validate().is_err());

        config.input.synthetic_pulse_us = [3_000_000_000, 3_000_000_000];
        config.input.frame_period_us = 4_000_000_000;
        assert!(config.validate().is_err());

        config.input.synthetic_pulse_us = [12_000, 7_999];
        config.input.frame_period_us = 20_000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = create_valid_config();
        config.telemetry.enabled = true;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = create_valid_config();
        config.telemetry.enabled = false;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_records_per_file_zero() {
        let mut config = create_valid_config();
        config.telemetry.max_records_per_file = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_files_to_keep_zero() {
        let mut config = create_valid_config();
        config.telemetry.max_files_to_keep = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = create_valid_config();
        config.telemetry.format = "csv".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_logging_file_dir() {
        let mut config = create_valid_config();
        config.logging.file_dir = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_tick_period_ns(), 3200);
        assert_eq!(default_min_pulse_ticks(), 156);
        assert_eq!(default_neutral_pulse_ticks(), 469);
        assert_eq!(default_max_pulse_ticks(), 782);
        assert_eq!(default_min_low_ticks(), 3000);
        assert_eq!(default_stale_ticks(), 35000);
        assert_eq!(default_error_credit(), 5);
        assert_eq!(default_full_scale(), 255);
        assert_eq!(default_poll_interval_us(), 1000);
        assert_eq!(default_display_interval_ms(), 100);
        assert!(default_motor_enabled());
        assert_eq!(default_motor_port(), "/dev/ttyACM0");
        assert_eq!(default_baud_rate(), 115200);
        assert_eq!(default_synthetic_pulse_us(), [1500, 1500]);
        assert_eq!(default_frame_period_us(), 20000);
        assert!(!default_telemetry_enabled());
        assert_eq!(default_log_dir(), "./logs");
        assert_eq!(default_max_records_per_file(), 10000);
        assert_eq!(default_max_files_to_keep(), 10);
        assert_eq!(default_log_format(), "jsonl");
    }
}
