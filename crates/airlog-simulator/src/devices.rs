//! Emulated HTU21D and SenseAir S8.
//!
//! Both speak the same wire protocol as the real parts, so the core drivers
//! run unmodified against them.

use std::collections::VecDeque;

use airlog_core::checksum::{htu21d_crc, modbus_crc16_bytes};
use airlog_core::sensors::htu21d::HTU21D_ADDRESS;
use airlog_core::sensors::s8::{REQUEST_LEN, RESPONSE_LEN, request_frame};
use embedded_hal::i2c::{ErrorKind as I2cErrorKind, ErrorType as I2cErrorType, NoAcknowledgeSource};
use embedded_hal_async::i2c::{I2c, Operation};
use embedded_io::{ErrorKind as SerialErrorKind, ErrorType as SerialErrorType, ReadReady};
use embedded_io_async::{Read, Write};
use log::{debug, warn};

use crate::climate::{Climate, FaultInjector};

const TRIGGER_TEMPERATURE: u8 = 0xE3;
const TRIGGER_HUMIDITY: u8 = 0xE5;

/// Status bit the HTU21D sets in humidity words.
const HUMIDITY_STATUS_BIT: u16 = 0x02;

fn temperature_word(celsius: f32) -> u16 {
    let raw = ((celsius + 46.85) * 65536.0 / 175.72).clamp(0.0, 65535.0) as u16;
    raw & 0xFFFC
}

fn humidity_word(percent: f32) -> u16 {
    let raw = ((percent + 6.0) * 65536.0 / 125.0).clamp(0.0, 65535.0) as u16;
    (raw & 0xFFFC) | HUMIDITY_STATUS_BIT
}

/// HTU21D on a two-wire bus.
///
/// A trigger command latches one measurement; the next read returns it as
/// `[msb, lsb, crc]`.
pub struct EmulatedHtu21d {
    climate: Climate,
    faults: FaultInjector,
    latched: Option<u16>,
}

impl EmulatedHtu21d {
    pub fn new(climate: Climate, faults: FaultInjector) -> Self {
        Self {
            climate,
            faults,
            latched: None,
        }
    }

    fn command(&mut self, bytes: &[u8]) -> Result<(), I2cErrorKind> {
        self.latched = match bytes {
            [TRIGGER_TEMPERATURE] => Some(temperature_word(self.climate.temperature())),
            [TRIGGER_HUMIDITY] => Some(humidity_word(self.climate.humidity())),
            _ => {
                warn!("HTU21D: unsupported command {:02X?}", bytes);
                return Err(I2cErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
            }
        };
        Ok(())
    }

    fn measurement(&mut self, buf: &mut [u8]) -> Result<(), I2cErrorKind> {
        // Reading without a pending measurement is NACKed by the part.
        let word = self
            .latched
            .take()
            .ok_or(I2cErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))?;

        let [msb, lsb] = word.to_be_bytes();
        let mut crc = htu21d_crc(msb, lsb);
        if self.faults.next_frame_corrupt() {
            debug!("HTU21D: corrupting checksum of word {:#06X}", word);
            crc ^= 0xFF;
        }

        for (slot, byte) in buf.iter_mut().zip([msb, lsb, crc]) {
            *slot = byte;
        }
        Ok(())
    }
}

impl I2cErrorType for EmulatedHtu21d {
    type Error = I2cErrorKind;
}

impl I2c for EmulatedHtu21d {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != HTU21D_ADDRESS {
            return Err(I2cErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        for operation in operations {
            match operation {
                Operation::Write(bytes) => self.command(bytes)?,
                Operation::Read(buf) => self.measurement(buf)?,
            }
        }
        Ok(())
    }
}

/// SenseAir S8 behind a serial port.
///
/// Answers each well-formed 8-byte read request with a 13-byte frame and
/// stays silent on anything else. Reading an empty receive buffer times out
/// the way the firmware's UART adapter does.
pub struct EmulatedS8 {
    climate: Climate,
    faults: FaultInjector,
    request: heapless::Vec<u8, REQUEST_LEN>,
    response: VecDeque<u8>,
}

impl EmulatedS8 {
    pub fn new(climate: Climate, faults: FaultInjector) -> Self {
        Self {
            climate,
            faults,
            request: heapless::Vec::new(),
            response: VecDeque::new(),
        }
    }

    fn handle_request(&mut self) {
        if self.request.as_slice() != request_frame() {
            warn!("S8: ignoring unexpected request {:02X?}", self.request);
            return;
        }

        let mut frame = [0u8; RESPONSE_LEN];
        frame[..3].copy_from_slice(&[0xFE, 0x04, 0x08]);
        frame[9..11].copy_from_slice(&self.climate.co2().to_be_bytes());
        let crc = modbus_crc16_bytes(&frame[..RESPONSE_LEN - 2]);
        frame[RESPONSE_LEN - 2..].copy_from_slice(&crc);

        if self.faults.next_frame_corrupt() {
            debug!("S8: corrupting checksum of response");
            frame[RESPONSE_LEN - 1] ^= 0xFF;
        }

        self.response.extend(frame);
    }
}

impl SerialErrorType for EmulatedS8 {
    type Error = SerialErrorKind;
}

impl Write for EmulatedS8 {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        for &byte in buf {
            // Capacity is exactly one request, handled as soon as it is full.
            let _ = self.request.push(byte);
            if self.request.is_full() {
                self.handle_request();
                self.request.clear();
            }
        }
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Read for EmulatedS8 {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.response.is_empty() {
            return Err(SerialErrorKind::TimedOut);
        }
        let count = buf.len().min(self.response.len());
        for (slot, byte) in buf.iter_mut().zip(self.response.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }
}

impl ReadReady for EmulatedS8 {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.response.is_empty())
    }
}
