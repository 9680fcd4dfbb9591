//! Serial adapter with a receive timeout
//!
//! Wraps the async UART so that a read which sees no data within the timeout
//! fails with `ErrorKind::TimedOut`, which the S8 driver takes as the end of
//! a response.

use airlog_core::sensors::s8::S8_RESPONSE_TIMEOUT_MS;
use embassy_time::{Duration, with_timeout};
use embedded_io::{ErrorKind, ReadReady};
use embedded_io_async::{ErrorType, Read, Write};
use esp_hal::uart::Uart;
use log::error;

pub struct TimedUart<'d> {
    uart: Uart<'d, esp_hal::Async>,
    timeout: Duration,
}

impl<'d> TimedUart<'d> {
    pub fn new(uart: Uart<'d, esp_hal::Async>) -> Self {
        Self::with_timeout(uart, Duration::from_millis(S8_RESPONSE_TIMEOUT_MS))
    }

    pub fn with_timeout(uart: Uart<'d, esp_hal::Async>, timeout: Duration) -> Self {
        Self { uart, timeout }
    }
}

impl ErrorType for TimedUart<'_> {
    type Error = ErrorKind;
}

impl Read for TimedUart<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match with_timeout(self.timeout, self.uart.read_async(buf)).await {
            Ok(Ok(read)) => Ok(read),
            Ok(Err(e)) => {
                error!("UART receive error: {:?}", e);
                Err(ErrorKind::Other)
            }
            Err(_) => Err(ErrorKind::TimedOut),
        }
    }
}

impl ReadReady for TimedUart<'_> {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.uart.read_ready())
    }
}

impl Write for TimedUart<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.uart.write_async(buf).await.map_err(|e| {
            error!("UART transmit error: {:?}", e);
            ErrorKind::Other
        })
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.uart.flush_async().await.map_err(|e| {
            error!("UART flush error: {:?}", e);
            ErrorKind::Other
        })
    }
}
