//! Scripted bus and timing stubs shared by the unit tests.

use std::collections::VecDeque;
use std::vec::Vec;

use embedded_hal_async::delay::DelayNs;
use embedded_io::{ErrorKind, ErrorType, ReadReady};
use embedded_io_async::{Read, Write};

use crate::network::NetworkLink;
use crate::telemetry::{TelemetryClient, TelemetryRecord};

/// Delay that returns immediately and records how long it was asked to wait.
#[derive(Debug, Default)]
pub struct CountingDelay {
    pub total_ms: u32,
    pub calls: u32,
}

impl DelayNs for CountingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ms += ns / 1_000_000;
        self.calls += 1;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.total_ms += ms;
        self.calls += 1;
    }
}

/// Serial port that answers each written request with the next scripted frame.
///
/// Replies queue up in one receive buffer like a UART FIFO, so unread bytes
/// survive the next request. Reading an empty buffer fails with
/// [`ErrorKind::TimedOut`], after which the next late delivery (if any)
/// lands in the buffer.
pub struct ScriptedSerial {
    responses: VecDeque<Vec<u8>>,
    late: VecDeque<Vec<u8>>,
    pending: VecDeque<u8>,
    chunk_size: usize,
    pub written: Vec<Vec<u8>>,
}

impl ScriptedSerial {
    pub fn new(responses: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            late: VecDeque::new(),
            pending: VecDeque::new(),
            chunk_size: usize::MAX,
            written: Vec::new(),
        }
    }

    /// Deliver responses at most `chunk_size` bytes per `read`.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Bytes that arrive only after a read has timed out.
    pub fn with_late_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.late.push_back(bytes);
        self
    }
}

impl ErrorType for ScriptedSerial {
    type Error = ErrorKind;
}

impl Write for ScriptedSerial {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.written.push(buf.to_vec());
        let reply = self.responses.pop_front().unwrap_or_default();
        self.pending.extend(reply);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Read for ScriptedSerial {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.pending.is_empty() {
            if let Some(bytes) = self.late.pop_front() {
                self.pending.extend(bytes);
            }
            return Err(ErrorKind::TimedOut);
        }

        let count = buf.len().min(self.chunk_size).min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }
}

impl ReadReady for ScriptedSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.pending.is_empty())
    }
}

/// Network link that comes up after a set number of `connect` calls.
pub struct FakeLink {
    pub connected: bool,
    pub succeed_on_attempt: Option<u32>,
    pub connect_calls: u32,
}

impl FakeLink {
    pub fn up() -> Self {
        Self {
            connected: true,
            succeed_on_attempt: Some(1),
            connect_calls: 0,
        }
    }

    pub fn down(succeed_on_attempt: Option<u32>) -> Self {
        Self {
            connected: false,
            succeed_on_attempt,
            connect_calls: 0,
        }
    }
}

impl NetworkLink for FakeLink {
    type Error = &'static str;

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<(), Self::Error> {
        self.connect_calls += 1;
        match self.succeed_on_attempt {
            Some(n) if self.connect_calls >= n => {
                self.connected = true;
                Ok(())
            }
            _ => Err("association rejected"),
        }
    }
}

/// Telemetry client that keeps everything it was sent.
#[derive(Default)]
pub struct RecordingClient {
    pub sent: Vec<TelemetryRecord>,
    pub connects: u32,
    pub disconnects: u32,
    pub pending_checks: u32,
    pub fail_connect: bool,
    pub fail_send: bool,
}

impl TelemetryClient for RecordingClient {
    type Error = &'static str;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        if self.fail_connect {
            return Err("server unreachable");
        }
        self.connects += 1;
        Ok(())
    }

    async fn send_telemetry(&mut self, record: TelemetryRecord) -> Result<(), Self::Error> {
        if self.fail_send {
            return Err("publish rejected");
        }
        self.sent.push(record);
        Ok(())
    }

    async fn check_pending_messages(&mut self) -> Result<usize, Self::Error> {
        self.pending_checks += 1;
        Ok(0)
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.disconnects += 1;
        Ok(())
    }
}
