use core::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::app_state::AppError;

/// Process-wide configuration, loaded once at startup and handed to the
/// constructors of the network link, telemetry client and poller.
#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    pub internet: InternetConfig<'a>,
    pub cloud: CloudConfig<'a>,
    #[serde(default)]
    pub sampling: SamplingConfig,
}

impl<'a> Config<'a> {
    /// Parse a JSON configuration document.
    ///
    /// Strings are borrowed from `json`, so they must not contain escapes.
    pub fn from_json(json: &'a str) -> Result<Self, AppError> {
        serde_json::from_str(json).map_err(|e| {
            let mut message = heapless::String::new();
            // Truncated messages are still useful.
            let _ = write!(message, "{e}");
            AppError::Config(message)
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

/// ThingsBoard MQTT endpoint. The access token doubles as the MQTT user name.
#[derive(Serialize, Deserialize, Debug)]
pub struct CloudConfig<'a> {
    pub host: &'a str,
    #[serde(default = "CloudConfig::default_port")]
    pub port: u16,
    pub access_token: &'a str,
}

impl CloudConfig<'_> {
    const fn default_port() -> u16 {
        crate::thingsboard::DEFAULT_MQTT_PORT
    }
}

impl Default for CloudConfig<'_> {
    fn default() -> Self {
        Self {
            host: "demo.thingsboard.io",
            port: Self::default_port(),
            access_token: "",
        }
    }
}

/// Polling cadence and sensor retry policy.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct SamplingConfig {
    /// Pause between the end of one cycle and the start of the next.
    pub interval_ms: u32,
    /// Attempts per sensor read before the field is reported as missing.
    pub read_attempts: u8,
    pub retry_backoff_ms: u32,
    /// Keep the cloud session open between cycles instead of reconnecting
    /// every cycle.
    pub keep_session: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            read_attempts: 3,
            retry_backoff_ms: 100,
            keep_session: false,
        }
    }
}
