//! Telemetry record and the reporting client seam
//!
//! A [`TelemetryRecord`] is built once per poll cycle from whatever readings
//! succeeded and is handed by value to a [`TelemetryClient`]. Readings that
//! could not be obtained are `None` and are left out of the JSON payload, so
//! the server only ever sees validated values.

use alloc::string::String;
use core::fmt;

use serde::Serialize;

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetryRecord {
    /// CO2 concentration in ppm.
    #[serde(rename = "CO2", skip_serializing_if = "Option::is_none")]
    pub co2: Option<f32>,
    /// Temperature in degrees Celsius.
    #[serde(rename = "Temperature", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Relative humidity in percent.
    #[serde(rename = "Humidity", skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f32>,
}

impl TelemetryRecord {
    /// True when no sensor produced a reading this cycle.
    pub const fn is_empty(&self) -> bool {
        self.co2.is_none() && self.temperature.is_none() && self.humidity.is_none()
    }

    /// Serialize to the JSON object posted to the telemetry server.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

struct Reading(Option<f32>, u8);

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{:.*}", usize::from(self.1), value),
            None => f.write_str("n/a"),
        }
    }
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CO2: {} ppm, Temperature: {} °C, Humidity: {} %",
            Reading(self.co2, 0),
            Reading(self.temperature, 2),
            Reading(self.humidity, 2),
        )
    }
}

/// Cloud reporting collaborator.
///
/// Implementations are constructed with the server address and access token
/// from [`crate::config::CloudConfig`].
pub trait TelemetryClient {
    type Error: fmt::Debug;

    /// Open a session with the telemetry server.
    fn connect(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Publish one record.
    fn send_telemetry(
        &mut self,
        record: TelemetryRecord,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Poll for inbound messages and return how many were pending.
    ///
    /// The poller only acknowledges them; nothing acts on their content.
    fn check_pending_messages(&mut self) -> impl Future<Output = Result<usize, Self::Error>>;

    /// Close the session.
    fn disconnect(&mut self) -> impl Future<Output = Result<(), Self::Error>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_uses_metric_names() {
        let record = TelemetryRecord {
            co2: Some(410.0),
            temperature: Some(21.5),
            humidity: Some(40.25),
        };

        assert_eq!(
            record.to_json().unwrap(),
            r#"{"CO2":410.0,"Temperature":21.5,"Humidity":40.25}"#
        );
    }

    #[test]
    fn test_json_omits_missing_readings() {
        let record = TelemetryRecord {
            co2: None,
            temperature: Some(21.5),
            humidity: None,
        };

        assert_eq!(record.to_json().unwrap(), r#"{"Temperature":21.5}"#);
        assert!(!record.is_empty());
    }

    #[test]
    fn test_empty_record() {
        let record = TelemetryRecord::default();

        assert!(record.is_empty());
        assert_eq!(record.to_json().unwrap(), "{}");
    }

    #[test]
    fn test_display_marks_missing_readings() {
        let record = TelemetryRecord {
            co2: Some(612.0),
            temperature: Some(20.621_59),
            humidity: None,
        };

        assert_eq!(
            record.to_string(),
            "CO2: 612 ppm, Temperature: 20.62 °C, Humidity: n/a %"
        );
    }
}
