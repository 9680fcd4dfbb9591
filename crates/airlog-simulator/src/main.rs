//! Desktop simulator for the airlog telemetry node.
//!
//! Runs the real [`TelemetryPoller`] against an emulated HTU21D and SenseAir
//! S8 and logs every payload instead of posting it.
//!
//! # Environment
//!
//! | Variable             | Meaning                                          |
//! |----------------------|--------------------------------------------------|
//! | `AIRLOG_CONFIG`      | path to a JSON config file (overrides the rest)  |
//! | `WIFI_SSID`          | reported network name                            |
//! | `TB_HOST`, `TB_PORT` | telemetry server                                 |
//! | `TB_ACCESS_TOKEN`    | device access token                              |
//! | `AIRLOG_INTERVAL_MS` | pause between cycles                             |
//! | `AIRLOG_FAULT_EVERY` | corrupt the checksum of every Nth sensor frame   |
//! | `AIRLOG_CYCLES`      | stop after this many cycles (default: never)     |
//!
//! A `.env` file in the working directory is loaded first.

mod climate;
mod cloud;
mod devices;

use std::env;
use std::fs;
use std::num::NonZeroU32;
use std::process;
use std::str::FromStr;

use airlog_core::sensors::{Htu21d, S8};
use airlog_core::{
    AppError, CloudConfig, Config, InternetConfig, SamplingConfig, TelemetryPoller,
};
use embassy_futures::block_on;
use log::{error, info, warn};

use crate::climate::{Climate, FaultInjector};
use crate::cloud::{LogSink, LoopbackLink, StdDelay};
use crate::devices::{EmulatedHtu21d, EmulatedS8};

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let value = env::var(key).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("Ignoring unparsable {}={:?}", key, value);
            None
        }
    }
}

/// Owned backing store for a [`Config`] assembled from the environment.
struct EnvSettings {
    ssid: String,
    password: String,
    host: String,
    port: u16,
    access_token: String,
}

impl EnvSettings {
    fn load() -> Self {
        let defaults = CloudConfig::default();
        Self {
            ssid: env_or("WIFI_SSID", "simulated"),
            password: env_or("WIFI_PASSWORD", ""),
            host: env_or("TB_HOST", defaults.host),
            port: env_parse("TB_PORT").unwrap_or(defaults.port),
            access_token: env_or("TB_ACCESS_TOKEN", "SIMULATOR"),
        }
    }

    fn config(&self) -> Config<'_> {
        let mut sampling = SamplingConfig::default();
        if let Some(interval_ms) = env_parse("AIRLOG_INTERVAL_MS") {
            sampling.interval_ms = interval_ms;
        }

        Config {
            internet: InternetConfig {
                ssid: &self.ssid,
                password: &self.password,
            },
            cloud: CloudConfig {
                host: &self.host,
                port: self.port,
                access_token: &self.access_token,
            },
            sampling,
        }
    }
}

fn run(config: &Config<'_>, cycles: Option<u32>, faults: FaultInjector) -> Result<(), AppError> {
    info!(
        "Network '{}', reporting to {}:{}",
        config.internet.ssid, config.cloud.host, config.cloud.port
    );

    let climate = Climate::new();
    let mut poller = TelemetryPoller::new(
        Htu21d::new(EmulatedHtu21d::new(climate, faults), StdDelay),
        S8::new(EmulatedS8::new(climate, faults)),
        StdDelay,
        LoopbackLink,
        LogSink::new(&config.cloud),
        config.sampling,
    );

    block_on(async {
        let Some(cycles) = cycles else {
            let Err(e) = poller.run().await;
            return Err(e);
        };

        poller.run_cycles(cycles).await
    })?;

    let (_, _, _, _, sink) = poller.release();
    info!("Published {} records", sink.published());
    Ok(())
}

fn main() {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting airlog simulator");

    let faults = FaultInjector::new(env_parse::<NonZeroU32>("AIRLOG_FAULT_EVERY"));
    let cycles = env_parse::<u32>("AIRLOG_CYCLES");

    let config_text = match env::var("AIRLOG_CONFIG") {
        Ok(path) => match fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) => {
                error!("Cannot read config file {}: {}", path, e);
                process::exit(1);
            }
        },
        Err(_) => None,
    };
    let settings = EnvSettings::load();

    let config = match config_text.as_deref().map(Config::from_json) {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            error!("{}", e);
            process::exit(1);
        }
        None => settings.config(),
    };

    if let Err(e) = run(&config, cycles, faults) {
        error!("{}", e);
        process::exit(1);
    }

    info!("Simulator exiting");
}
