//! Configuration baked in at build time by `build.rs`.

use airlog_core::{CloudConfig, Config, InternetConfig, SamplingConfig};
use log::warn;

const WIFI_SSID: &str = env!("WIFI_SSID");
const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");
const TB_ACCESS_TOKEN: &str = env!("TB_ACCESS_TOKEN");
const TB_HOST: Option<&str> = option_env!("TB_HOST");
const TB_PORT: Option<&str> = option_env!("TB_PORT");
const AIRLOG_INTERVAL_MS: Option<&str> = option_env!("AIRLOG_INTERVAL_MS");

fn parse_or<T: core::str::FromStr>(name: &str, value: Option<&str>, default: T) -> T {
    match value.map(str::parse) {
        Some(Ok(parsed)) => parsed,
        Some(Err(_)) => {
            warn!("Ignoring invalid {}, using default", name);
            default
        }
        None => default,
    }
}

pub fn config() -> Config<'static> {
    let cloud_defaults = CloudConfig::default();
    let sampling_defaults = SamplingConfig::default();

    Config {
        internet: InternetConfig {
            ssid: WIFI_SSID,
            password: WIFI_PASSWORD,
        },
        cloud: CloudConfig {
            host: TB_HOST.unwrap_or(cloud_defaults.host),
            port: parse_or("TB_PORT", TB_PORT, cloud_defaults.port),
            access_token: TB_ACCESS_TOKEN,
        },
        sampling: SamplingConfig {
            interval_ms: parse_or(
                "AIRLOG_INTERVAL_MS",
                AIRLOG_INTERVAL_MS,
                sampling_defaults.interval_ms,
            ),
            ..sampling_defaults
        },
    }
}
