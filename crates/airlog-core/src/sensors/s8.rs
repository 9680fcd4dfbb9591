//! Senseair S8 CO2 sensor over Modbus on a UART
//!
//! The driver sends a fixed "read input registers" request for IR1..IR4 and
//! parses the reply:
//!
//! | Offset | Content                                  |
//! |--------|------------------------------------------|
//! | 0      | slave address (`0xFE`)                   |
//! | 1      | function code (`0x04`)                   |
//! | 2      | byte count (`0x08`)                      |
//! | 3..5   | IR1, meter status (byte 3 is reported)   |
//! | 5..9   | IR2, IR3                                 |
//! | 9..11  | IR4, CO2 concentration in ppm (BE)       |
//! | 11..13 | CRC-16/MODBUS (LE)                       |
//!
//! The UART is expected to be configured for 9600 baud 8N1. Its `read` fails
//! with [`ErrorKind::TimedOut`] once nothing more arrives within the response
//! timeout, which ends the frame.
//!
//! Bytes left in the receive buffer are discarded before every request, so a
//! stray byte or a reply that arrived after an earlier timeout never shifts
//! the next frame.

use embedded_io::{Error as _, ErrorKind, ReadReady};
use embedded_io_async::{Read, Write};
use heapless::Vec;
use log::{debug, error, warn};

use super::SensorError;
use crate::checksum;

const SENSOR_NAME: &str = "S8";

pub const S8_BAUD_RATE: u32 = 9600;

/// How long the serial adapter waits for the reply before reporting no data.
pub const S8_RESPONSE_TIMEOUT_MS: u64 = 1000;

const SLAVE_ADDRESS: u8 = 0xFE;
const READ_INPUT_REGISTERS: u8 = 0x04;

/// Four 16-bit registers.
const PAYLOAD_BYTE_COUNT: u8 = 0x08;

/// Read four input registers starting at IR1.
const READ_REQUEST: [u8; 6] = [SLAVE_ADDRESS, READ_INPUT_REGISTERS, 0x00, 0x00, 0x00, 0x04];

/// Full request length including the CRC.
pub const REQUEST_LEN: usize = READ_REQUEST.len() + 2;

/// Address, function, byte count, 4 registers and the CRC.
pub const RESPONSE_LEN: usize = 13;

/// Anything shorter cannot hold a CRC and at least one payload byte.
const MIN_FRAME_LEN: usize = 3;

const STATUS_OFFSET: usize = 3;
const CO2_OFFSET: usize = 9;

/// Validated reading from one request/response round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct S8Reading {
    /// High byte of the meter status register. Zero means no fault.
    pub status: u8,
    pub co2_ppm: u16,
}

/// The request frame with its CRC appended.
pub fn request_frame() -> [u8; REQUEST_LEN] {
    let mut frame = [0u8; REQUEST_LEN];
    frame[..READ_REQUEST.len()].copy_from_slice(&READ_REQUEST);
    frame[READ_REQUEST.len()..].copy_from_slice(&checksum::modbus_crc16_bytes(&READ_REQUEST));
    frame
}

/// Validate a response frame and extract the status byte and CO2 value.
///
/// The CRC is checked first, so a corrupted frame reports
/// [`SensorError::Checksum`] even when it is also short. A frame with a good
/// CRC that is too short for the register layout, answers a different slave
/// or function, or carries a different register count is a
/// [`SensorError::MalformedFrame`].
pub fn parse_response(frame: &[u8]) -> Result<S8Reading, SensorError> {
    let malformed = SensorError::MalformedFrame {
        sensor: SENSOR_NAME,
        expected: RESPONSE_LEN,
        received: frame.len(),
    };

    if frame.len() < MIN_FRAME_LEN {
        return Err(malformed);
    }

    if !checksum::modbus_frame_valid(frame) {
        return Err(SensorError::Checksum {
            sensor: SENSOR_NAME,
        });
    }

    if frame.len() < RESPONSE_LEN
        || frame[0] != SLAVE_ADDRESS
        || frame[1] != READ_INPUT_REGISTERS
        || frame[2] != PAYLOAD_BYTE_COUNT
    {
        return Err(malformed);
    }

    Ok(S8Reading {
        status: frame[STATUS_OFFSET],
        co2_ppm: u16::from_be_bytes([frame[CO2_OFFSET], frame[CO2_OFFSET + 1]]),
    })
}

fn serial_error<E: embedded_io::Error>(operation: &'static str, e: E) -> SensorError {
    error!("S8 serial {} failed: {:?}", operation, e);
    SensorError::Serial {
        sensor: SENSOR_NAME,
        operation,
        kind: e.kind(),
    }
}

pub struct S8<U> {
    uart: U,
}

impl<U: Read + Write + ReadReady> S8<U> {
    pub fn new(uart: U) -> Self {
        Self { uart }
    }

    /// Request the meter status and CO2 concentration.
    pub async fn status_and_co2(&mut self) -> Result<S8Reading, SensorError> {
        let stale = self.discard_pending_input().await?;
        if stale > 0 {
            warn!("S8: discarded {} stale bytes before the request", stale);
        }

        let request = request_frame();
        self.uart
            .write_all(&request)
            .await
            .map_err(|e| serial_error("write request", e))?;
        self.uart
            .flush()
            .await
            .map_err(|e| serial_error("flush request", e))?;

        let frame = self.read_response().await?;
        debug!("S8: received {:02x?}", frame.as_slice());

        let reading = parse_response(&frame).map_err(|e| {
            error!("S8 rejected response {:02x?}: {}", frame.as_slice(), e);
            e
        })?;

        if reading.status != 0 {
            warn!("S8: meter status {:#04x} reports a sensor fault", reading.status);
        }

        Ok(reading)
    }

    /// Request only the CO2 concentration in ppm.
    pub async fn co2(&mut self) -> Result<u16, SensorError> {
        self.status_and_co2().await.map(|reading| reading.co2_ppm)
    }

    /// Give back the UART.
    pub fn release(self) -> U {
        self.uart
    }

    /// Collect bytes until a full response arrived or the port goes quiet.
    ///
    /// Bytes still queued behind a full frame make it malformed.
    async fn read_response(&mut self) -> Result<Vec<u8, RESPONSE_LEN>, SensorError> {
        let mut frame: Vec<u8, RESPONSE_LEN> = Vec::new();
        let mut chunk = [0u8; RESPONSE_LEN];

        while frame.len() < RESPONSE_LEN {
            let room = RESPONSE_LEN - frame.len();
            let read = match self.uart.read(&mut chunk[..room]).await {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) => return Err(serial_error("read response", e)),
            };

            let received = frame.len() + read;
            frame
                .extend_from_slice(&chunk[..read])
                .map_err(|_| SensorError::MalformedFrame {
                    sensor: SENSOR_NAME,
                    expected: RESPONSE_LEN,
                    received,
                })?;
        }

        if frame.is_empty() {
            error!("S8: no response within {} ms", S8_RESPONSE_TIMEOUT_MS);
            return Err(SensorError::Timeout {
                sensor: SENSOR_NAME,
            });
        }

        if frame.is_full() {
            let trailing = self.discard_pending_input().await?;
            if trailing > 0 {
                error!("S8: {} unexpected bytes after the response", trailing);
                return Err(SensorError::MalformedFrame {
                    sensor: SENSOR_NAME,
                    expected: RESPONSE_LEN,
                    received: RESPONSE_LEN + trailing,
                });
            }
        }

        Ok(frame)
    }

    /// Drain whatever is already sitting in the receive buffer.
    async fn discard_pending_input(&mut self) -> Result<usize, SensorError> {
        let mut scratch = [0u8; RESPONSE_LEN];
        let mut discarded = 0;

        while self
            .uart
            .read_ready()
            .map_err(|e| serial_error("poll receive buffer", e))?
        {
            match self.uart.read(&mut scratch).await {
                Ok(0) => break,
                Ok(read) => {
                    debug!("S8: dropping {:02x?}", &scratch[..read]);
                    discarded += read;
                }
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) => return Err(serial_error("discard input", e)),
            }
        }

        Ok(discarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedSerial;
    use embassy_futures::block_on;

    /// Status 0, 410 ppm.
    const GOOD_RESPONSE: [u8; RESPONSE_LEN] = [
        0xFE, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x9A, 0x96, 0xE1,
    ];

    #[test]
    fn test_request_frame_bytes() {
        assert_eq!(
            request_frame(),
            [0xFE, 0x04, 0x00, 0x00, 0x00, 0x04, 0xE5, 0xC6]
        );
        assert!(checksum::modbus_frame_valid(&request_frame()));
    }

    #[test]
    fn test_status_and_co2_from_scripted_serial() {
        let serial = ScriptedSerial::new([GOOD_RESPONSE.to_vec()]);
        let mut sensor = S8::new(serial);

        let reading = block_on(sensor.status_and_co2()).unwrap();
        assert_eq!(
            reading,
            S8Reading {
                status: 0,
                co2_ppm: 410
            }
        );

        let serial = sensor.release();
        assert_eq!(serial.written, [request_frame().to_vec()]);
    }

    #[test]
    fn test_response_delivered_in_fragments() {
        let serial = ScriptedSerial::new([GOOD_RESPONSE.to_vec()]).with_chunk_size(4);
        let mut sensor = S8::new(serial);

        assert_eq!(block_on(sensor.co2()), Ok(410));
    }

    #[test]
    fn test_status_byte_is_extracted() {
        let response = [
            0xFE, 0x04, 0x08, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x20, 0x97, 0xEB,
        ];
        let mut sensor = S8::new(ScriptedSerial::new([response.to_vec()]));

        let reading = block_on(sensor.status_and_co2()).unwrap();
        assert_eq!(reading.status, 0x02);
        assert_eq!(reading.co2_ppm, 800);
    }

    #[test]
    fn test_corrupted_short_response_is_checksum_error() {
        let response = [0xFE, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xCA, 0xA6];
        let mut sensor = S8::new(ScriptedSerial::new([response.to_vec()]));

        assert_eq!(
            block_on(sensor.status_and_co2()),
            Err(SensorError::Checksum { sensor: "S8" })
        );
    }

    #[test]
    fn test_corrupted_full_response_is_checksum_error() {
        let mut response = GOOD_RESPONSE;
        response[RESPONSE_LEN - 1] ^= 0x01;
        let mut sensor = S8::new(ScriptedSerial::new([response.to_vec()]));

        assert_eq!(
            block_on(sensor.co2()),
            Err(SensorError::Checksum { sensor: "S8" })
        );
    }

    #[test]
    fn test_short_response_with_valid_crc_is_malformed() {
        let response = [0xFE, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xCA, 0xA7];
        let mut sensor = S8::new(ScriptedSerial::new([response.to_vec()]));

        assert_eq!(
            block_on(sensor.status_and_co2()),
            Err(SensorError::MalformedFrame {
                sensor: "S8",
                expected: RESPONSE_LEN,
                received: 11,
            })
        );
    }

    #[test]
    fn test_exception_response_is_malformed() {
        // Function code with the exception bit set, exception 0x02.
        let response = [0xFE, 0x84, 0x02, 0xF2, 0xF1];
        assert!(checksum::modbus_frame_valid(&response));
        assert_eq!(
            parse_response(&response),
            Err(SensorError::MalformedFrame {
                sensor: "S8",
                expected: RESPONSE_LEN,
                received: 5,
            })
        );
    }

    #[test]
    fn test_tiny_response_is_malformed() {
        assert_eq!(
            parse_response(&[0xFE, 0x04]),
            Err(SensorError::MalformedFrame {
                sensor: "S8",
                expected: RESPONSE_LEN,
                received: 2,
            })
        );
    }

    #[test]
    fn test_wrong_register_count_is_malformed() {
        let response = [
            0xFE, 0x04, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x9A, 0xDA, 0x81,
        ];
        assert!(checksum::modbus_frame_valid(&response));
        assert_eq!(
            parse_response(&response),
            Err(SensorError::MalformedFrame {
                sensor: "S8",
                expected: RESPONSE_LEN,
                received: RESPONSE_LEN,
            })
        );
    }

    #[test]
    fn test_stray_leading_byte_does_not_desync_later_requests() {
        let mut shifted = vec![0x00];
        shifted.extend_from_slice(&GOOD_RESPONSE);
        let serial = ScriptedSerial::new([
            shifted,
            GOOD_RESPONSE.to_vec(),
            GOOD_RESPONSE.to_vec(),
        ]);
        let mut sensor = S8::new(serial);

        assert_eq!(
            block_on(sensor.co2()),
            Err(SensorError::MalformedFrame {
                sensor: "S8",
                expected: RESPONSE_LEN,
                received: RESPONSE_LEN + 1,
            })
        );
        assert_eq!(block_on(sensor.co2()), Ok(410));
        assert_eq!(block_on(sensor.co2()), Ok(410));
    }

    #[test]
    fn test_late_reply_is_not_reported_for_the_next_request() {
        let late_reply = GOOD_RESPONSE.to_vec();
        let current_reply = vec![
            0xFE, 0x04, 0x08, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x20, 0x97, 0xEB,
        ];
        let serial = ScriptedSerial::new([vec![], current_reply]).with_late_bytes(late_reply);
        let mut sensor = S8::new(serial);

        assert_eq!(
            block_on(sensor.co2()),
            Err(SensorError::Timeout { sensor: "S8" })
        );
        assert_eq!(block_on(sensor.co2()), Ok(800));

        let serial = sensor.release();
        assert_eq!(serial.written.len(), 2);
    }

    #[test]
    fn test_silent_sensor_is_timeout() {
        let mut sensor = S8::new(ScriptedSerial::new([vec![]]));

        assert_eq!(
            block_on(sensor.status_and_co2()),
            Err(SensorError::Timeout { sensor: "S8" })
        );
    }
}
