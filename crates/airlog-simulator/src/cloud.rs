//! Host stand-ins for the network link, the telemetry server and the timer.

use std::convert::Infallible;
use std::thread;
use std::time::Duration;

use airlog_core::thingsboard::TELEMETRY_TOPIC;
use airlog_core::{CloudConfig, NetworkLink, TelemetryClient, TelemetryRecord};
use embedded_hal_async::delay::DelayNs;
use log::{debug, info};

/// The host network is assumed to be up.
pub struct LoopbackLink;

impl NetworkLink for LoopbackLink {
    type Error = Infallible;

    fn is_connected(&self) -> bool {
        true
    }

    async fn connect(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Telemetry "broker" that logs the payload a real client would publish.
pub struct LogSink {
    broker: String,
    published: u32,
}

impl LogSink {
    pub fn new(cloud: &CloudConfig<'_>) -> Self {
        Self {
            broker: format!("mqtt://{}@{}:{}", cloud.access_token, cloud.host, cloud.port),
            published: 0,
        }
    }

    pub fn published(&self) -> u32 {
        self.published
    }
}

impl TelemetryClient for LogSink {
    type Error = String;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        debug!("Session opened");
        Ok(())
    }

    async fn send_telemetry(&mut self, record: TelemetryRecord) -> Result<(), Self::Error> {
        let payload = record.to_json().map_err(|e| e.to_string())?;
        info!("PUBLISH {} {} {}", self.broker, TELEMETRY_TOPIC, payload);
        self.published += 1;
        Ok(())
    }

    async fn check_pending_messages(&mut self) -> Result<usize, Self::Error> {
        Ok(0)
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        debug!("Session closed");
        Ok(())
    }
}

/// Blocking delay; the simulator runs the poller on a single thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    async fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    async fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    #[test]
    fn test_sink_counts_published_records() {
        let cloud = CloudConfig {
            host: "tb.local",
            port: 1883,
            access_token: "TOKEN",
        };
        let mut sink = LogSink::new(&cloud);
        let record = TelemetryRecord {
            co2: Some(612.0),
            temperature: None,
            humidity: Some(48.5),
        };

        block_on(sink.send_telemetry(record)).unwrap();

        assert_eq!(sink.published(), 1);
        assert_eq!(sink.broker, "mqtt://TOKEN@tb.local:1883");
    }
}
