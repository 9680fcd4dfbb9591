//! Checksum algorithms used to validate sensor frames
//!
//! Two unrelated algorithms live here:
//!
//! - The HTU21D polynomial check: a CRC-8 (x^8 + x^5 + x^4 + 1) run as a long
//!   division over the 16-bit data word plus the sensor's checksum byte.
//! - CRC-16/MODBUS used by the Senseair S8 on the serial bus, computed with
//!   the catalogued algorithm from the `crc` crate.
//!
//! Both are pure functions over byte buffers. Deciding what a failed check
//! means is left to the drivers.

use crc::{CRC_16_MODBUS, Crc};

/// HTU21D generator polynomial `0x131` aligned to bit 23 of the remainder.
const HTU21D_DIVISOR: u32 = 0x98_8000;

/// Number of division steps: one per bit of the 16-bit data word.
const HTU21D_DIVISION_STEPS: u32 = 16;

const MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Long division of a 24-bit word by the HTU21D divisor.
///
/// Bit `23 - i` is tested MSB first and the divisor moves one place right on
/// every step, whether or not it was applied.
fn htu21d_remainder(word: u32) -> u32 {
    let mut remainder = word;
    let mut divisor = HTU21D_DIVISOR;

    for i in 0..HTU21D_DIVISION_STEPS {
        if remainder & (1 << (23 - i)) != 0 {
            remainder ^= divisor;
        }
        divisor >>= 1;
    }

    remainder
}

/// Check a 3-byte HTU21D frame (data MSB, data LSB, checksum).
///
/// Returns `true` when the remainder of the division is zero.
pub fn htu21d_frame_valid(frame: &[u8; 3]) -> bool {
    let word = (u32::from(frame[0]) << 16) | (u32::from(frame[1]) << 8) | u32::from(frame[2]);
    htu21d_remainder(word) == 0
}

/// Compute the checksum byte the HTU21D appends to a data word.
pub fn htu21d_crc(msb: u8, lsb: u8) -> u8 {
    let word = (u32::from(msb) << 16) | (u32::from(lsb) << 8);
    // The remainder never exceeds 8 bits after 16 steps.
    htu21d_remainder(word) as u8
}

/// CRC-16/MODBUS over an arbitrary buffer.
pub fn modbus_crc16(data: &[u8]) -> u16 {
    MODBUS.checksum(data)
}

/// CRC-16/MODBUS in wire order (least significant byte first).
pub fn modbus_crc16_bytes(data: &[u8]) -> [u8; 2] {
    modbus_crc16(data).to_le_bytes()
}

/// Check a Modbus frame whose last two bytes carry the CRC of everything before them.
pub fn modbus_frame_valid(frame: &[u8]) -> bool {
    if frame.len() < 2 {
        return false;
    }

    let (payload, crc) = frame.split_at(frame.len() - 2);
    modbus_crc16_bytes(payload) == crc
}
