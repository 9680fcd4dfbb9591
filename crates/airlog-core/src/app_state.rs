//! Application run state and error types for airlog

use thiserror_no_std::Error;

/// Where the telemetry poller currently is in its cycle.
///
/// `Connecting` is re-entered whenever the network association is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRunState {
    Connecting,
    Ready,
    Reporting,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network unavailable after {attempts} connection attempts")]
    NetworkUnavailable { attempts: u8 },
    #[error("Telemetry client failed to {operation}")]
    Telemetry { operation: &'static str },
    #[error("Invalid configuration: {0}")]
    Config(heapless::String<64>),
}
