//! Network association seam
//!
//! The link itself (Wi-Fi on the device, a loopback in the simulator) lives
//! outside the core. The core only needs to know whether it is up and how to
//! ask it to come up, and applies a fixed retry budget on top.

use core::fmt;

use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

use crate::app_state::AppError;

/// Connection attempts before the network is declared unavailable.
pub const NETWORK_CONNECT_ATTEMPTS: u8 = 5;

/// Pause between connection attempts.
pub const NETWORK_RETRY_INTERVAL_MS: u32 = 1000;

pub trait NetworkLink {
    type Error: fmt::Debug;

    fn is_connected(&self) -> bool;

    /// Start (or restart) association with the configured network.
    fn connect(&mut self) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Bring the link up, retrying up to [`NETWORK_CONNECT_ATTEMPTS`] times,
/// [`NETWORK_RETRY_INTERVAL_MS`] apart.
pub async fn ensure_network<N, D>(link: &mut N, delay: &mut D) -> Result<(), AppError>
where
    N: NetworkLink,
    D: DelayNs,
{
    if link.is_connected() {
        return Ok(());
    }

    info!("Connecting to network...");

    for attempt in 1..=NETWORK_CONNECT_ATTEMPTS {
        if let Err(e) = link.connect().await {
            warn!(
                "Network connect attempt {}/{} failed: {:?}",
                attempt, NETWORK_CONNECT_ATTEMPTS, e
            );
        }

        if link.is_connected() {
            info!("Network connected");
            return Ok(());
        }

        if attempt < NETWORK_CONNECT_ATTEMPTS {
            info!(
                "Network not up yet, {} attempts left",
                NETWORK_CONNECT_ATTEMPTS - attempt
            );
            delay.delay_ms(NETWORK_RETRY_INTERVAL_MS).await;
        }
    }

    error!(
        "Network still down after {} attempts",
        NETWORK_CONNECT_ATTEMPTS
    );
    Err(AppError::NetworkUnavailable {
        attempts: NETWORK_CONNECT_ATTEMPTS,
    })
}
