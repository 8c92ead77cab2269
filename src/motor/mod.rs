//! # Motor Output Module
//!
//! Delivers drive commands to the motor controller.
//!
//! This module handles:
//! - The [`MotorOutput`] actuator interface used by the control loop
//! - Drive frame encoding with CRC-8 protection
//! - Opening the serial link to the motor controller
//! - Suppressing repeated identical frames, with a periodic keep-alive

pub mod crc;
pub mod frame;
pub mod output_trait;
pub mod port;

pub use output_trait::{DryRunMotors, MotorOutput};

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::control::mixer::DriveCommand;
use crate::error::{RcBridgeError, Result};
use frame::encode_drive_frame;
use port::{LinkPort, SerialLinkPort};

/// Default motor controller baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Ports tried after the configured one (in order of preference)
const FALLBACK_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // USB CDC motor controllers
    "/dev/ttyUSB0", // USB-to-serial adapters
];

/// An unchanged command is re-sent at least this often
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(100);

/// Serial connection to the motor controller
pub struct MotorLink<P: LinkPort = SerialLinkPort> {
    port: P,
    device_path: String,
    keepalive: Duration,
    last_sent: Option<(DriveCommand, Instant)>,
}

impl<P: LinkPort> std::fmt::Debug for MotorLink<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotorLink")
            .field("device_path", &self.device_path)
            .field("keepalive", &self.keepalive)
            .finish_non_exhaustive()
    }
}

impl MotorLink<SerialLinkPort> {
    /// Open the motor controller, trying `preferred` first and then the
    /// common USB serial paths.
    ///
    /// # Errors
    ///
    /// Returns `MotorLinkNotFound` if no port could be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rc_drive_bridge::motor::MotorLink;
    ///
    /// let link = MotorLink::open("/dev/ttyACM0", 115_200)?;
    /// println!("Motor controller on {}", link.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(preferred: &str, baud_rate: u32) -> Result<Self> {
        let mut paths: Vec<&str> = Vec::with_capacity(FALLBACK_DEVICE_PATHS.len() + 1);
        if !preferred.is_empty() {
            paths.push(preferred);
        }
        for path in FALLBACK_DEVICE_PATHS {
            if !paths.contains(path) {
                paths.push(path);
            }
        }
        Self::open_with_paths(&paths, baud_rate)
    }

    /// Open the first port in `paths` that succeeds
    ///
    /// # Errors
    ///
    /// Returns `MotorLinkNotFound` listing every path tried
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying motor controller port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(stream) => {
                    info!("Opened motor controller at {} ({} baud)", path, baud_rate);
                    return Ok(Self::with_port(SerialLinkPort::new(stream), *path));
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                }
            }
        }

        Err(RcBridgeError::MotorLinkNotFound(paths.join(", ")))
    }

    /// Open one serial port as 8N1 without flow control
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| RcBridgeError::Serial(format!("Failed to open {}: {}", path, e)))
    }
}

impl<P: LinkPort> MotorLink<P> {
    /// Wrap an already opened port
    pub fn with_port(port: P, device_path: impl Into<String>) -> Self {
        Self {
            port,
            device_path: device_path.into(),
            keepalive: KEEPALIVE_INTERVAL,
            last_sent: None,
        }
    }

    /// Override the keep-alive interval. Zero sends every command.
    #[must_use]
    pub fn with_keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Path of the opened serial device
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Write one drive frame unconditionally
    ///
    /// # Errors
    ///
    /// Returns `Serial` error if writing or flushing fails
    pub async fn send_command(&mut self, command: DriveCommand) -> Result<()> {
        let frame = encode_drive_frame(command);

        let written = async {
            self.port
                .write_all(&frame)
                .await
                .map_err(|e| RcBridgeError::Serial(format!("Failed to write drive frame: {}", e)))?;
            self.port
                .flush()
                .await
                .map_err(|e| RcBridgeError::Serial(format!("Failed to flush motor port: {}", e)))
        }
        .await;

        match written {
            Ok(()) => {
                self.last_sent = Some((command, Instant::now()));
                debug!("Sent drive frame ({}, {})", command.left, command.right);
                Ok(())
            }
            Err(e) => {
                self.last_sent = None;
                Err(e)
            }
        }
    }

    fn is_repeat(&self, command: DriveCommand) -> bool {
        matches!(self.last_sent, Some((last, at)) if last == command && at.elapsed() < self.keepalive)
    }
}

#[async_trait]
impl<P: LinkPort> MotorOutput for MotorLink<P> {
    async fn set_motors(&mut self, command: DriveCommand) -> Result<()> {
        if self.is_repeat(command) {
            return Ok(());
        }
        self.send_command(command).await
    }
}
