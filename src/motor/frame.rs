//! # Drive Frame Codec
//!
//! Binary frame carrying one drive command to the motor controller.
//!
//! ```text
//! +------+--------+------+-----------+------------+------+
//! | sync | length | type | left i16  | right i16  | crc  |
//! | 0xA5 |  0x05  | 0x01 | big endian| big endian |      |
//! +------+--------+------+-----------+------------+------+
//! ```
//!
//! `length` counts type and payload bytes. The CRC-8/DVB-S2 covers length,
//! type and payload.

use bytes::{BufMut, Bytes, BytesMut};

use super::crc::crc8;
use crate::control::mixer::DriveCommand;
use crate::error::{RcBridgeError, Result};

/// Frame start marker
pub const DRIVE_SYNC_BYTE: u8 = 0xA5;

/// Drive command frame type
pub const DRIVE_FRAME_TYPE: u8 = 0x01;

/// Drive payload size (two i16 values)
pub const DRIVE_PAYLOAD_SIZE: usize = 4;

/// Value of the length field: type + payload
pub const DRIVE_FRAME_LENGTH: u8 = 1 + DRIVE_PAYLOAD_SIZE as u8;

/// Complete frame size: sync + length + type + payload + crc
pub const DRIVE_FRAME_SIZE: usize = 2 + DRIVE_FRAME_LENGTH as usize + 1;

/// Encodes `command` into a complete drive frame.
///
/// # Examples
///
/// ```
/// use rc_drive_bridge::control::mixer::DriveCommand;
/// use rc_drive_bridge::motor::frame::{encode_drive_frame, DRIVE_FRAME_SIZE};
///
/// let frame = encode_drive_frame(DriveCommand::new(255, -255));
/// assert_eq!(frame.len(), DRIVE_FRAME_SIZE);
/// assert_eq!(&frame[3..7], &[0x00, 0xFF, 0xFF, 0x01]);
/// ```
#[must_use]
pub fn encode_drive_frame(command: DriveCommand) -> Bytes {
    let mut frame = BytesMut::with_capacity(DRIVE_FRAME_SIZE);
    frame.put_u8(DRIVE_SYNC_BYTE);
    frame.put_u8(DRIVE_FRAME_LENGTH);
    frame.put_u8(DRIVE_FRAME_TYPE);
    frame.put_i16(command.left);
    frame.put_i16(command.right);

    let crc = crc8(&frame[1..]);
    frame.put_u8(crc);
    frame.freeze()
}

/// Decodes a complete drive frame.
///
/// # Errors
///
/// Returns `Serial` error if the frame is truncated, has the wrong sync,
/// length or type byte, or fails the CRC.
pub fn decode_drive_frame(frame: &[u8]) -> Result<DriveCommand> {
    if frame.len() < DRIVE_FRAME_SIZE {
        return Err(RcBridgeError::Serial(format!(
            "Drive frame too short: expected {} bytes, got {}",
            DRIVE_FRAME_SIZE,
            frame.len()
        )));
    }
    if frame[0] != DRIVE_SYNC_BYTE {
        return Err(RcBridgeError::Serial(format!("Invalid sync byte: 0x{:02X}", frame[0])));
    }
    if frame[1] != DRIVE_FRAME_LENGTH || frame[2] != DRIVE_FRAME_TYPE {
        return Err(RcBridgeError::Serial(format!(
            "Unexpected length/type: 0x{:02X}/0x{:02X}",
            frame[1], frame[2]
        )));
    }

    let crc_index = DRIVE_FRAME_SIZE - 1;
    let expected = crc8(&frame[1..crc_index]);
    if frame[crc_index] != expected {
        return Err(RcBridgeError::Serial(format!(
            "CRC mismatch: expected 0x{:02X}, got 0x{:02X}",
            expected, frame[crc_index]
        )));
    }

    Ok(DriveCommand::new(
        i16::from_be_bytes([frame[3], frame[4]]),
        i16::from_be_bytes([frame[5], frame[6]]),
    ))
}
