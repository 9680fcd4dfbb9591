//! Telemetry polling loop
//!
//! One cycle opens a cloud session, samples the S8 and the HTU21D, publishes
//! the resulting [`TelemetryRecord`], acknowledges pending inbound messages
//! and closes the session again. Cycles are separated by a fixed pause after
//! the end of the previous one, so the effective period drifts by the time
//! spent on bus and network I/O.
//!
//! A sensor read that glitches is retried a bounded number of times. If it
//! keeps failing, that field is missing from the record and the cycle still
//! reports whatever else was read.

use core::convert::Infallible;

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use embedded_io::ReadReady;
use embedded_io_async::{Read, Write};
use log::{debug, error, info, warn};

use crate::app_state::{AppError, AppRunState};
use crate::config::SamplingConfig;
use crate::network::{NetworkLink, ensure_network};
use crate::sensors::{Htu21d, S8, SensorError};
use crate::telemetry::{TelemetryClient, TelemetryRecord};

/// One physical quantity sampled per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quantity {
    Co2,
    Temperature,
    Humidity,
}

impl Quantity {
    const fn label(self) -> &'static str {
        match self {
            Self::Co2 => "CO2",
            Self::Temperature => "Temperature",
            Self::Humidity => "Humidity",
        }
    }
}

pub struct TelemetryPoller<I, U, D, N, C> {
    htu21d: Htu21d<I, D>,
    s8: S8<U>,
    delay: D,
    link: N,
    client: C,
    sampling: SamplingConfig,
    state: AppRunState,
    session_open: bool,
}

impl<I, U, D, N, C> TelemetryPoller<I, U, D, N, C>
where
    I: I2c,
    U: Read + Write + ReadReady,
    D: DelayNs,
    N: NetworkLink,
    C: TelemetryClient,
{
    pub fn new(
        htu21d: Htu21d<I, D>,
        s8: S8<U>,
        delay: D,
        link: N,
        client: C,
        sampling: SamplingConfig,
    ) -> Self {
        Self {
            htu21d,
            s8,
            delay,
            link,
            client,
            sampling,
            state: AppRunState::Connecting,
            session_open: false,
        }
    }

    pub fn state(&self) -> AppRunState {
        self.state
    }

    /// Associate with the network before the first cycle.
    ///
    /// Failing here is fatal: the caller is expected to stop.
    pub async fn startup(&mut self) -> Result<(), AppError> {
        self.state = AppRunState::Connecting;
        ensure_network(&mut self.link, &mut self.delay).await?;
        self.state = AppRunState::Ready;
        Ok(())
    }

    /// Run forever. Only returns if the network cannot be brought up at startup.
    pub async fn run(&mut self) -> Result<Infallible, AppError> {
        self.startup().await?;

        loop {
            if let Err(e) = self.run_cycle().await {
                warn!("Telemetry cycle aborted: {}", e);
            }
            self.idle().await;
        }
    }

    /// Run a fixed number of cycles, pausing only between them.
    pub async fn run_cycles(&mut self, cycles: u32) -> Result<(), AppError> {
        self.startup().await?;

        for cycle in 1..=cycles {
            if let Err(e) = self.run_cycle().await {
                warn!("Telemetry cycle aborted: {}", e);
            }
            if cycle < cycles {
                self.idle().await;
            }
        }
        Ok(())
    }

    /// Pause between cycles.
    pub async fn idle(&mut self) {
        self.delay.delay_ms(self.sampling.interval_ms).await;
    }

    /// Sample all sensors and report the record.
    ///
    /// Sensor failures never abort the cycle. Network and telemetry client
    /// failures do, and the session is dropped so the next cycle starts clean.
    pub async fn run_cycle(&mut self) -> Result<TelemetryRecord, AppError> {
        if !self.link.is_connected() {
            warn!("Network association lost");
            self.state = AppRunState::Connecting;
            self.session_open = false;
            ensure_network(&mut self.link, &mut self.delay).await?;
            self.state = AppRunState::Ready;
        }

        if !self.session_open {
            self.client.connect().await.map_err(|e| {
                error!("Telemetry connect failed: {:?}", e);
                AppError::Telemetry {
                    operation: "connect",
                }
            })?;
            self.session_open = true;
        }

        self.state = AppRunState::Reporting;
        let record = self.sample().await;
        info!("{}", record);

        let result = self.report(record).await;
        if result.is_err() || !self.sampling.keep_session {
            self.close_session().await;
        }
        self.state = AppRunState::Ready;

        result.map(|()| record)
    }

    /// Read every sensor once (with retries) into a record.
    ///
    /// The S8 is read a single time per cycle and that value is used for
    /// both the record and the log line.
    pub async fn sample(&mut self) -> TelemetryRecord {
        TelemetryRecord {
            co2: self.sample_with_retry(Quantity::Co2).await,
            temperature: self.sample_with_retry(Quantity::Temperature).await,
            humidity: self.sample_with_retry(Quantity::Humidity).await,
        }
    }

    /// Give back the owned collaborators.
    pub fn release(self) -> (Htu21d<I, D>, S8<U>, D, N, C) {
        (self.htu21d, self.s8, self.delay, self.link, self.client)
    }

    async fn read_once(&mut self, quantity: Quantity) -> Result<f32, SensorError> {
        match quantity {
            Quantity::Co2 => self.s8.co2().await.map(f32::from),
            Quantity::Temperature => self.htu21d.temperature().await,
            Quantity::Humidity => self.htu21d.humidity().await,
        }
    }

    async fn sample_with_retry(&mut self, quantity: Quantity) -> Option<f32> {
        let attempts = self.sampling.read_attempts.max(1);

        for attempt in 1..=attempts {
            match self.read_once(quantity).await {
                Ok(value) => return Some(value),
                Err(e) => {
                    warn!(
                        "{} read failed (attempt {}/{}): {}",
                        quantity.label(),
                        attempt,
                        attempts,
                        e
                    );
                    if attempt < attempts {
                        self.delay.delay_ms(self.sampling.retry_backoff_ms).await;
                    }
                }
            }
        }

        error!(
            "{} unavailable this cycle after {} attempts",
            quantity.label(),
            attempts
        );
        None
    }

    async fn report(&mut self, record: TelemetryRecord) -> Result<(), AppError> {
        if record.is_empty() {
            warn!("No sensor produced a reading, nothing to publish");
        } else {
            self.client.send_telemetry(record).await.map_err(|e| {
                error!("Telemetry publish failed: {:?}", e);
                AppError::Telemetry {
                    operation: "send telemetry",
                }
            })?;
        }

        let pending = self.client.check_pending_messages().await.map_err(|e| {
            error!("Checking pending messages failed: {:?}", e);
            AppError::Telemetry {
                operation: "check pending messages",
            }
        })?;
        if pending > 0 {
            debug!("Acknowledged {} pending server messages", pending);
        }

        Ok(())
    }

    async fn close_session(&mut self) {
        if let Err(e) = self.client.disconnect().await {
            warn!("Telemetry disconnect failed: {:?}", e);
        }
        self.session_open = false;
    }
}
