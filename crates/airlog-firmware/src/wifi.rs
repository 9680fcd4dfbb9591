//! Wi-Fi station link
//!
//! Associates with the configured access point and waits for DHCP. The core's
//! `ensure_network` decides how often to retry.

use airlog_core::{InternetConfig, NetworkLink};
use embassy_net::Stack;
use embassy_time::{Duration, with_timeout};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiError};
use log::info;
use thiserror_no_std::Error;

/// How long to wait for a DHCP lease after association.
const DHCP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum WifiLinkError {
    #[error("Wi-Fi driver error: {0:?}")]
    Radio(WifiError),
    #[error("No DHCP lease")]
    DhcpTimeout,
}

impl From<WifiError> for WifiLinkError {
    fn from(e: WifiError) -> Self {
        Self::Radio(e)
    }
}

pub struct WifiLink {
    controller: WifiController<'static>,
    stack: Stack<'static>,
}

impl WifiLink {
    pub fn new(
        mut controller: WifiController<'static>,
        stack: Stack<'static>,
        internet: &InternetConfig<'_>,
    ) -> Result<Self, WifiLinkError> {
        let client = ClientConfig::default()
            .with_ssid(internet.ssid.into())
            .with_password(internet.password.into());
        controller.set_config(&ModeConfig::Client(client))?;

        info!("Wi-Fi configured for '{}'", internet.ssid);
        Ok(Self { controller, stack })
    }
}

impl NetworkLink for WifiLink {
    type Error = WifiLinkError;

    fn is_connected(&self) -> bool {
        matches!(self.controller.is_connected(), Ok(true)) && self.stack.is_config_up()
    }

    async fn connect(&mut self) -> Result<(), Self::Error> {
        if !matches!(self.controller.is_started(), Ok(true)) {
            self.controller.start_async().await?;
            info!("Wi-Fi started");
        }

        self.controller.connect_async().await?;
        info!("Wi-Fi associated, waiting for DHCP");

        with_timeout(DHCP_TIMEOUT, self.stack.wait_config_up())
            .await
            .map_err(|_| WifiLinkError::DhcpTimeout)?;

        if let Some(config) = self.stack.config_v4() {
            info!("IP address: {}", config.address);
        }
        Ok(())
    }
}
