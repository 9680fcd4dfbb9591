//! ThingsBoard device MQTT API conventions
//!
//! A device authenticates with its access token as the MQTT user name,
//! publishes telemetry as a JSON object to [`TELEMETRY_TOPIC`] and receives
//! server-side RPC requests on `v1/devices/me/rpc/request/{id}`. No I/O
//! happens here; the firmware drives an MQTT client over a TCP socket.

/// Plain MQTT listener of a ThingsBoard server.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

pub const TELEMETRY_TOPIC: &str = "v1/devices/me/telemetry";

/// Subscription covering every server-side RPC request.
pub const RPC_REQUEST_FILTER: &str = "v1/devices/me/rpc/request/+";

const RPC_REQUEST_PREFIX: &str = "v1/devices/me/rpc/request/";

/// Request id of a server-side RPC delivered on `topic`.
///
/// Returns `None` for any other topic, including a request topic whose id is
/// not a number.
pub fn rpc_request_id(topic: &str) -> Option<u32> {
    topic.strip_prefix(RPC_REQUEST_PREFIX)?.parse().ok()
}
