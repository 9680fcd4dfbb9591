//! ThingsBoard device MQTT client over an embassy-net TCP socket
//!
//! One TCP connection per session. The socket and packet buffers live in the
//! client; an `MqttClient` is laid over them for each operation, so nothing
//! borrows across calls.

use airlog_core::thingsboard::{RPC_REQUEST_FILTER, TELEMETRY_TOPIC, rpc_request_id};
use airlog_core::{CloudConfig, TelemetryClient, TelemetryRecord};
use embassy_net::dns::{self, DnsQueryType};
use embassy_net::tcp::{ConnectError, State, TcpSocket};
use embassy_net::{IpEndpoint, Stack};
use embassy_time::{Duration, with_timeout};
use log::{debug, error, info, warn};
use rust_mqtt::client::client::MqttClient;
use rust_mqtt::client::client_config::{ClientConfig, MqttVersion};
use rust_mqtt::packet::v5::publish_packet::QualityOfService;
use rust_mqtt::packet::v5::reason_codes::ReasonCode;
use rust_mqtt::utils::rng_generator::CountingRng;
use thiserror_no_std::Error;

/// Stalled reads or writes fail after this long.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound on a graceful close before the socket is aborted.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to listen for queued server messages after publishing.
const PENDING_POLL_WINDOW: Duration = Duration::from_millis(500);

const KEEP_ALIVE_SECS: u16 = 60;

const MAX_PROPERTIES: usize = 5;

/// Seed for packet identifiers.
const PACKET_ID_SEED: u64 = 20_000;

type Session<'s> = MqttClient<'s, &'s mut TcpSocket<'static>, MAX_PROPERTIES, CountingRng>;

#[derive(Error, Debug)]
pub enum ThingsBoardError {
    #[error("DNS lookup failed: {0:?}")]
    Dns(dns::Error),
    #[error("Host did not resolve to an address")]
    NoAddress,
    #[error("TCP connect failed: {0:?}")]
    Connect(ConnectError),
    #[error("MQTT error: {0:?}")]
    Mqtt(ReasonCode),
    #[error("Not connected")]
    NotConnected,
    #[error("Telemetry could not be encoded")]
    Encode,
}

pub struct ThingsBoardClient<'a> {
    stack: Stack<'static>,
    socket: TcpSocket<'static>,
    write_buffer: &'static mut [u8],
    recv_buffer: &'static mut [u8],
    host: &'a str,
    port: u16,
    access_token: &'a str,
}

impl<'a> ThingsBoardClient<'a> {
    pub fn new(
        stack: Stack<'static>,
        socket_buffers: (&'static mut [u8], &'static mut [u8]),
        mqtt_buffers: (&'static mut [u8], &'static mut [u8]),
        cloud: &CloudConfig<'a>,
    ) -> Self {
        let (rx_buffer, tx_buffer) = socket_buffers;
        let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);
        socket.set_timeout(Some(SOCKET_TIMEOUT));
        let (write_buffer, recv_buffer) = mqtt_buffers;

        Self {
            stack,
            socket,
            write_buffer,
            recv_buffer,
            host: cloud.host,
            port: cloud.port,
            access_token: cloud.access_token,
        }
    }

    async fn resolve(&self) -> Result<IpEndpoint, ThingsBoardError> {
        let addresses = self
            .stack
            .dns_query(self.host, DnsQueryType::A)
            .await
            .map_err(|e| {
                error!("DNS query for {} failed: {:?}", self.host, e);
                ThingsBoardError::Dns(e)
            })?;
        let address = addresses.first().copied().ok_or_else(|| {
            error!("DNS returned no results for {}", self.host);
            ThingsBoardError::NoAddress
        })?;

        Ok(IpEndpoint::new(address, self.port))
    }

    /// MQTT protocol state over the open socket.
    ///
    /// The access token is both client id and user name, which is how
    /// ThingsBoard authenticates a device.
    fn session(&mut self) -> Session<'_> {
        let mut config = ClientConfig::new(MqttVersion::MQTTv5, CountingRng(PACKET_ID_SEED));
        config.add_client_id(self.access_token);
        config.add_username(self.access_token);
        config.add_max_subscribe_qos(QualityOfService::QoS1);
        config.keep_alive = KEEP_ALIVE_SECS;
        config.max_packet_size = self.recv_buffer.len() as u32;

        let write_len = self.write_buffer.len();
        let recv_len = self.recv_buffer.len();
        MqttClient::new(
            &mut self.socket,
            &mut *self.write_buffer,
            write_len,
            &mut *self.recv_buffer,
            recv_len,
            config,
        )
    }

    fn ensure_open(&self) -> Result<(), ThingsBoardError> {
        if self.socket.state() == State::Established {
            Ok(())
        } else {
            Err(ThingsBoardError::NotConnected)
        }
    }

    async fn close_socket(&mut self) {
        self.socket.close();
        if with_timeout(CLOSE_TIMEOUT, self.socket.flush()).await.is_err() {
            debug!("Close timed out, aborting connection");
        }
        self.socket.abort();
    }
}

impl TelemetryClient for ThingsBoardClient<'_> {
    type Error = ThingsBoardError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        if self.socket.state() != State::Closed {
            self.socket.abort();
            let _ = self.socket.flush().await;
        }

        let endpoint = self.resolve().await?;
        self.socket.connect(endpoint).await.map_err(|e| {
            error!("TCP connect to {} failed: {:?}", endpoint, e);
            ThingsBoardError::Connect(e)
        })?;

        let setup = {
            let mut session = self.session();
            match session.connect_to_broker().await {
                Ok(()) => session.subscribe_to_topic(RPC_REQUEST_FILTER).await,
                Err(code) => Err(code),
            }
        };
        if let Err(code) = setup {
            error!("MQTT session setup with {} failed: {:?}", endpoint, code);
            self.close_socket().await;
            return Err(ThingsBoardError::Mqtt(code));
        }

        info!("Connected to ThingsBoard at {}", endpoint);
        Ok(())
    }

    async fn send_telemetry(&mut self, record: TelemetryRecord) -> Result<(), Self::Error> {
        self.ensure_open()?;

        let payload = record.to_json().map_err(|_| ThingsBoardError::Encode)?;
        self.session()
            .send_message(
                TELEMETRY_TOPIC,
                payload.as_bytes(),
                QualityOfService::QoS0,
                false,
            )
            .await
            .map_err(|code| {
                error!("Publish to {} failed: {:?}", TELEMETRY_TOPIC, code);
                ThingsBoardError::Mqtt(code)
            })?;

        info!("Published {}", payload);
        Ok(())
    }

    async fn check_pending_messages(&mut self) -> Result<usize, Self::Error> {
        self.ensure_open()?;

        let mut session = self.session();
        let mut pending = 0;
        loop {
            match with_timeout(PENDING_POLL_WINDOW, session.receive_message()).await {
                Err(_) => break,
                Ok(Ok((topic, _))) => match rpc_request_id(topic) {
                    Some(id) => {
                        debug!("RPC request {} received", id);
                        pending += 1;
                    }
                    None => debug!("Ignoring publication on {}", topic),
                },
                Ok(Err(code)) => {
                    error!("Receiving pending messages failed: {:?}", code);
                    return Err(ThingsBoardError::Mqtt(code));
                }
            }
        }

        Ok(pending)
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        if self.socket.state() == State::Established
            && let Err(code) = self.session().disconnect().await
        {
            warn!("MQTT disconnect failed: {:?}", code);
        }
        self.close_socket().await;
        Ok(())
    }
}
