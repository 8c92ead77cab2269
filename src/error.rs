//! # Error Types
//!
//! Custom error types for RC Drive Bridge using `thiserror`.
//!
//! Signal faults (stale receiver, malformed pulses) are not errors: they are
//! absorbed by the validator as error credit. Only I/O, configuration and
//! setup failures surface here.

use thiserror::Error;

/// Main error type for RC Drive Bridge
#[derive(Debug, Error)]
pub enum RcBridgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors on the motor link
    #[error("Serial port error: {0}")]
    Serial(String),

    /// No motor controller found on any of the tried ports
    #[error("Motor controller not found (tried: {0})")]
    MotorLinkNotFound(String),

    /// Malformed edge trace
    #[error("Edge trace error: {0}")]
    Trace(String),

    /// JSON encoding or decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Telemetry file handling errors
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

/// Result type alias for RC Drive Bridge
pub type Result<T> = std::result::Result<T, RcBridgeError>;
