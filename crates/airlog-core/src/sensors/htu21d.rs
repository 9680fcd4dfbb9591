//! HTU21D temperature/humidity sensor on the I2C bus
//!
//! Each measurement is a write of a single trigger command, a fixed settle
//! delay while the sensor converts, and a 3-byte read (data MSB, data LSB,
//! checksum). The low two bits of the data word are status bits and are
//! masked off before conversion.

use embedded_hal::i2c::Error as _;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use log::{debug, error};

use super::SensorError;
use crate::checksum;

const SENSOR_NAME: &str = "HTU21D";

/// Fixed 7-bit bus address of the HTU21D.
pub const HTU21D_ADDRESS: u8 = 0x40;

/// Bus clock the sensor is driven at.
pub const HTU21D_BUS_FREQUENCY_KHZ: u32 = 100;

/// Conversion time the sensor needs after a trigger command.
const SETTLE_TIME_MS: u32 = 50;

const STATUS_BITS_MASK: u16 = 0xFFFC;

/// Trigger commands understood by the HTU21D.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    TriggerTemperature = 0xE3,
    TriggerHumidity = 0xE5,
}

impl Command {
    const fn operation(self) -> &'static str {
        match self {
            Self::TriggerTemperature => "trigger temperature measurement",
            Self::TriggerHumidity => "trigger humidity measurement",
        }
    }
}

/// Convert a raw temperature word to degrees Celsius.
///
/// Takes the word widened to `u32` so the formula can be evaluated at the
/// full-scale value of 65536.
pub fn temperature_celsius(raw: u32) -> f32 {
    -46.85 + 175.72 * raw as f32 / 65536.0
}

/// Convert a raw humidity word to relative humidity in percent.
pub fn relative_humidity_percent(raw: u32) -> f32 {
    -6.0 + 125.0 * raw as f32 / 65536.0
}

pub struct Htu21d<I, D> {
    i2c: I,
    delay: D,
}

impl<I: I2c, D: DelayNs> Htu21d<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self { i2c, delay }
    }

    /// Run one full measurement cycle and return the raw data word with the
    /// status bits cleared.
    ///
    /// Fails with [`SensorError::Checksum`] if the frame does not validate.
    pub async fn issue_measurement(&mut self, command: Command) -> Result<u16, SensorError> {
        self.i2c
            .write(HTU21D_ADDRESS, &[command as u8])
            .await
            .map_err(|e| {
                error!("HTU21D write of command {:#04x} failed: {:?}", command as u8, e);
                SensorError::I2c {
                    sensor: SENSOR_NAME,
                    operation: command.operation(),
                    kind: e.kind(),
                }
            })?;

        self.delay.delay_ms(SETTLE_TIME_MS).await;

        let mut frame = [0u8; 3];
        self.i2c
            .read(HTU21D_ADDRESS, &mut frame)
            .await
            .map_err(|e| {
                error!("HTU21D read after command {:#04x} failed: {:?}", command as u8, e);
                SensorError::I2c {
                    sensor: SENSOR_NAME,
                    operation: "read measurement",
                    kind: e.kind(),
                }
            })?;

        if !checksum::htu21d_frame_valid(&frame) {
            error!("HTU21D checksum mismatch on frame {:02x?}", frame);
            return Err(SensorError::Checksum {
                sensor: SENSOR_NAME,
            });
        }

        let raw = u16::from_be_bytes([frame[0], frame[1]]) & STATUS_BITS_MASK;
        debug!("HTU21D: command {:#04x} -> raw {:#06x}", command as u8, raw);

        Ok(raw)
    }

    /// Measure the temperature in degrees Celsius.
    pub async fn temperature(&mut self) -> Result<f32, SensorError> {
        let raw = self.issue_measurement(Command::TriggerTemperature).await?;
        Ok(temperature_celsius(u32::from(raw)))
    }

    /// Measure the relative humidity in percent.
    pub async fn humidity(&mut self) -> Result<f32, SensorError> {
        let raw = self.issue_measurement(Command::TriggerHumidity).await?;
        Ok(relative_humidity_percent(u32::from(raw)))
    }

    /// Give back the bus and delay.
    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CountingDelay;
    use embassy_futures::block_on;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    const TOLERANCE: f32 = 1e-3;

    fn measurement(command: Command, response: [u8; 3]) -> [Transaction; 2] {
        [
            Transaction::write(HTU21D_ADDRESS, vec![command as u8]),
            Transaction::read(HTU21D_ADDRESS, response.to_vec()),
        ]
    }

    #[test]
    fn test_conversion_boundaries() {
        assert!((temperature_celsius(0) - -46.85).abs() < TOLERANCE);
        assert!((temperature_celsius(65536) - 128.87).abs() < TOLERANCE);
        assert!((relative_humidity_percent(0) - -6.0).abs() < TOLERANCE);
        assert!((relative_humidity_percent(65536) - 119.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_temperature_from_scripted_bus() {
        let mock = I2cMock::new(&measurement(Command::TriggerTemperature, [0x62, 0x4F, 0x9F]));
        let mut sensor = Htu21d::new(mock, CountingDelay::default());

        let temperature = block_on(sensor.temperature()).unwrap();

        // 0x624F with the status bits cleared is 0x624C.
        let expected = -46.85 + 175.72 * 0x624C as f32 / 65536.0;
        assert!((temperature - expected).abs() < TOLERANCE);
        assert!((temperature - 20.6216).abs() < TOLERANCE);

        let (mut mock, delay) = sensor.release();
        mock.done();
        assert_eq!(delay.total_ms, SETTLE_TIME_MS);
    }

    #[test]
    fn test_humidity_from_scripted_bus() {
        let mock = I2cMock::new(&measurement(Command::TriggerHumidity, [0x7C, 0x80, 0xF5]));
        let mut sensor = Htu21d::new(mock, CountingDelay::default());

        let humidity = block_on(sensor.humidity()).unwrap();
        assert!((humidity - 54.791).abs() < TOLERANCE);

        let (mut mock, _) = sensor.release();
        mock.done();
    }

    #[test]
    fn test_issue_measurement_masks_status_bits() {
        let mock = I2cMock::new(&measurement(Command::TriggerTemperature, [0x62, 0x4F, 0x9F]));
        let mut sensor = Htu21d::new(mock, CountingDelay::default());

        let raw = block_on(sensor.issue_measurement(Command::TriggerTemperature)).unwrap();
        assert_eq!(raw, 0x624C);

        let (mut mock, _) = sensor.release();
        mock.done();
    }

    #[test]
    fn test_each_accessor_runs_its_own_transaction() {
        let mut expectations = measurement(Command::TriggerTemperature, [0x62, 0x4F, 0x9F]).to_vec();
        expectations.extend(measurement(Command::TriggerHumidity, [0x7C, 0x80, 0xF5]));
        let mock = I2cMock::new(&expectations);
        let mut sensor = Htu21d::new(mock, CountingDelay::default());

        block_on(sensor.temperature()).unwrap();
        block_on(sensor.humidity()).unwrap();

        let (mut mock, delay) = sensor.release();
        mock.done();
        assert_eq!(delay.total_ms, 2 * SETTLE_TIME_MS);
    }

    #[test]
    fn test_corrupted_checksum_is_rejected() {
        let mock = I2cMock::new(&measurement(Command::TriggerTemperature, [0x62, 0x4F, 0x9E]));
        let mut sensor = Htu21d::new(mock, CountingDelay::default());

        let result = block_on(sensor.temperature());
        assert_eq!(result, Err(SensorError::Checksum { sensor: "HTU21D" }));

        let (mut mock, _) = sensor.release();
        mock.done();
    }

    #[test]
    fn test_bus_error_is_reported_with_kind() {
        let expectations = [Transaction::write(HTU21D_ADDRESS, vec![0xE5]).with_error(ErrorKind::Bus)];
        let mock = I2cMock::new(&expectations);
        let mut sensor = Htu21d::new(mock, CountingDelay::default());

        let result = block_on(sensor.humidity());
        assert_eq!(
            result,
            Err(SensorError::I2c {
                sensor: "HTU21D",
                operation: "trigger humidity measurement",
                kind: ErrorKind::Bus,
            })
        );

        let (mut mock, delay) = sensor.release();
        mock.done();
        assert_eq!(delay.total_ms, 0);
    }
}
