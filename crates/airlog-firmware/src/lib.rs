//! ESP32-S3 firmware-specific modules for airlog
//!
//! This crate contains the code that cannot compile on desktop targets:
//! peripheral initialization, the Wi-Fi link, the ThingsBoard MQTT client and
//! the build-time configuration. Everything else lives in `airlog_core`.

#![no_std]

extern crate alloc;

pub mod hardware;
pub mod settings;
pub mod thingsboard;
pub mod timed_uart;
pub mod wifi;
