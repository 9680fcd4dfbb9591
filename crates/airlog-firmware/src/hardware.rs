//! Bus initialization for the airlog board
//!
//! Wiring:
//!
//! | Signal        | GPIO |
//! |---------------|------|
//! | HTU21D SDA    | 8    |
//! | HTU21D SCL    | 9    |
//! | S8 RX (ours)  | 18   |
//! | S8 TX (ours)  | 17   |

use airlog_core::sensors::htu21d::HTU21D_BUS_FREQUENCY_KHZ;
use airlog_core::sensors::s8::S8_BAUD_RATE;
use esp_hal::i2c::master::{Config as I2cConfig, ConfigError as I2cConfigError, I2c};
use esp_hal::time::Rate;
use esp_hal::uart::{Config as UartConfig, ConfigError as UartConfigError, Uart};
use log::info;

/// Create the two-wire bus for the HTU21D at its fixed 100 kHz clock.
pub fn create_i2c_bus(
    i2c0: esp_hal::peripherals::I2C0<'static>,
    sda: esp_hal::peripherals::GPIO8<'static>,
    scl: esp_hal::peripherals::GPIO9<'static>,
) -> Result<I2c<'static, esp_hal::Async>, I2cConfigError> {
    let bus = I2c::new(
        i2c0,
        I2cConfig::default().with_frequency(Rate::from_khz(HTU21D_BUS_FREQUENCY_KHZ)),
    )?
    .with_sda(sda)
    .with_scl(scl)
    .into_async();

    info!("I2C bus ready at {} kHz", HTU21D_BUS_FREQUENCY_KHZ);
    Ok(bus)
}

/// Create the serial port for the S8: 9600 baud, 8N1.
pub fn create_s8_uart(
    uart1: esp_hal::peripherals::UART1<'static>,
    rx: esp_hal::peripherals::GPIO18<'static>,
    tx: esp_hal::peripherals::GPIO17<'static>,
) -> Result<Uart<'static, esp_hal::Async>, UartConfigError> {
    let uart = Uart::new(uart1, UartConfig::default().with_baudrate(S8_BAUD_RATE))?
        .with_rx(rx)
        .with_tx(tx)
        .into_async();

    info!("S8 UART ready at {} baud", S8_BAUD_RATE);
    Ok(uart)
}
