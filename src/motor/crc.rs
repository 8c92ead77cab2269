//! # CRC-8/DVB-S2
//!
//! Checksum protecting drive frames on the motor link.
//!
//! **Polynomial**: 0xD5 (x^8 + x^7 + x^6 + x^4 + x^2 + 1)
//! **Initial Value**: 0x00, no reflection, no final XOR

const POLY: u8 = 0xD5;

/// Lookup table built at compile time
const TABLE: [u8; 256] = build_table();

const fn build_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = shift_byte(i as u8);
        i += 1;
    }
    table
}

/// Runs eight polynomial shifts over one byte.
const fn shift_byte(mut crc: u8) -> u8 {
    let mut bit = 0;
    while bit < 8 {
        crc = if crc & 0x80 != 0 { (crc << 1) ^ POLY } else { crc << 1 };
        bit += 1;
    }
    crc
}

/// Computes the CRC-8/DVB-S2 of `data`.
///
/// # Examples
///
/// ```
/// use rc_drive_bridge::motor::crc::crc8;
///
/// assert_eq!(crc8(b"123456789"), 0xBC);
/// ```
#[must_use]
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |crc, &byte| TABLE[usize::from(crc ^ byte)])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bit-at-a-time reference
    fn crc8_bitwise(data: &[u8]) -> u8 {
        data.iter().fold(0u8, |crc, &byte| shift_byte(crc ^ byte))
    }

    #[test]
    fn test_check_value() {
        // Standard catalogue check value for CRC-8/DVB-S2
        assert_eq!(crc8(b"123456789"), 0xBC);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(crc8(&[]), 0x00);
    }

    #[test]
    fn test_table_matches_bitwise() {
        let inputs: [&[u8]; 4] = [
            &[0x05, 0x01, 0x00, 0xFF, 0xFF, 0x01],
            &[0xFF; 7],
            &[0x00, 0x80, 0x7F],
            b"drive",
        ];
        for data in inputs {
            assert_eq!(crc8(data), crc8_bitwise(data), "data: {:?}", data);
        }
    }

    #[test]
    fn test_single_bit_flip_detected() {
        let a = [0x05, 0x01, 0x00, 0x10, 0x00, 0x10];
        let mut b = a;
        b[3] ^= 0x01;
        assert_ne!(crc8(&a), crc8(&b));
    }
}
