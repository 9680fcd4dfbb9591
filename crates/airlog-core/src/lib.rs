//! Hardware-independent core library for airlog
//!
//! This crate contains all platform-agnostic logic for the airlog telemetry
//! node: checksum algorithms, the HTU21D and Senseair S8 sensor drivers, the
//! telemetry record, the collaborator traits for the network link and cloud
//! client, and the polling loop tying them together.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod app_state;
pub mod checksum;
pub mod config;
pub mod network;
pub mod poller;
pub mod sensors;
pub mod telemetry;
pub mod thingsboard;

#[cfg(test)]
pub(crate) mod test_support;

pub use app_state::{AppError, AppRunState};
pub use config::{CloudConfig, Config, InternetConfig, SamplingConfig};
pub use network::NetworkLink;
pub use poller::TelemetryPoller;
pub use sensors::SensorError;
pub use telemetry::{TelemetryClient, TelemetryRecord};
