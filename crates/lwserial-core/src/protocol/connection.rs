//! Connection management
//!
//! Runs managed request/response exchanges with the sensor: one request in
//! flight at a time, a bounded number of attempts, and an absolute deadline
//! per attempt. The same wait loop doubles as a non-blocking poll for picking
//! streamed frames out of the inbound byte stream.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::{
    FeedStatus, ProtocolError, Request, Response, ANY_COMMAND, REQUEST_RETRIES,
    RESPONSE_TIMEOUT_MS,
};
use crate::config::ConnectionConfig;
use crate::transport::{SerialTransport, Transport, TransportError};

/// Which frames a wait accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFilter {
    /// First complete frame of any command
    Any,
    /// Only frames carrying this command id
    Id(u8),
}

impl CommandFilter {
    /// Whether a frame with `command_id` satisfies the filter
    pub fn matches(&self, command_id: u8) -> bool {
        match self {
            CommandFilter::Any => true,
            CommandFilter::Id(id) => *id == command_id,
        }
    }
}

impl From<u8> for CommandFilter {
    fn from(command_id: u8) -> Self {
        if command_id == ANY_COMMAND {
            CommandFilter::Any
        } else {
            CommandFilter::Id(command_id)
        }
    }
}

/// Outcome of a wait that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// A matching frame is held in the response
    Ready,
    /// Non-blocking poll only: nothing matching has arrived yet
    Again,
}

/// Cumulative link statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCounters {
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    pub tx_frames: u64,
    pub rx_frames: u64,
    /// Requests re-sent after a timed out attempt
    pub retries: u64,
    /// Inbound frames dropped for a bad length or CRC
    pub rejected_frames: u64,
}

/// A sensor connection: one transport paired with its request and response
/// buffers
pub struct Connection<T: Transport> {
    transport: T,
    request: Request,
    response: Response,
    response_timeout_ms: u32,
    request_retries: u32,
    counters: LinkCounters,
}

impl Connection<SerialTransport> {
    /// Open the serial port named in `config`
    pub fn open(config: &ConnectionConfig) -> Result<Self, ProtocolError> {
        config
            .validate()
            .map_err(|e| ProtocolError::InvalidParameter(e.to_string()))?;
        let transport = SerialTransport::open(&config.port_name, config.baud_rate)?;
        Self::with_config(transport, config)
    }
}

impl<T: Transport> Connection<T> {
    /// Create a connection with the default timeout and retry budget
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            request: Request::new(),
            response: Response::new(),
            response_timeout_ms: RESPONSE_TIMEOUT_MS,
            request_retries: REQUEST_RETRIES,
            counters: LinkCounters::default(),
        }
    }

    /// Create a connection using the timeout and retry budget from `config`
    pub fn with_config(transport: T, config: &ConnectionConfig) -> Result<Self, ProtocolError> {
        config
            .validate()
            .map_err(|e| ProtocolError::InvalidParameter(e.to_string()))?;

        let mut connection = Self::new(transport);
        connection.response_timeout_ms = config.response_timeout_ms;
        connection.request_retries = config.request_retries;
        Ok(connection)
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the connection and return its transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// The request that the next exchange will send
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Build the next request in place
    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// The most recently parsed (or in-progress) response
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// The response buffer, mutably (e.g. to reset it)
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Get cumulative link counters
    pub fn counters(&self) -> LinkCounters {
        LinkCounters {
            rejected_frames: self.response.rejected_frames(),
            ..self.counters
        }
    }

    /// Per-attempt response timeout
    pub fn response_timeout_ms(&self) -> u32 {
        self.response_timeout_ms
    }

    /// Number of attempts per request
    pub fn request_retries(&self) -> u32 {
        self.request_retries
    }

    /// Yield through the transport's sleep, e.g. between non-blocking polls
    pub fn sleep_ms(&mut self, duration_ms: u32) {
        self.transport.sleep_ms(duration_ms);
    }

    /// Send bytes outside the framing protocol
    pub fn send_raw(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.write(data)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        match self.transport.send(data) {
            Ok(0) => {
                error!("send of {} bytes failed: link lost", data.len());
                Err(ProtocolError::TransportFatal(TransportError::LinkLost))
            }
            Ok(written) => {
                if written < data.len() {
                    warn!("short write: {} of {} bytes", written, data.len());
                }
                self.counters.tx_bytes = self.counters.tx_bytes.saturating_add(written as u64);
                Ok(())
            }
            Err(e) => {
                error!("send failed: {}", e);
                Err(ProtocolError::TransportFatal(e))
            }
        }
    }

    /// Build a request with `build` and run it to completion
    pub fn execute<F>(&mut self, build: F) -> Result<&Response, ProtocolError>
    where
        F: FnOnce(&mut Request) -> Result<(), ProtocolError>,
    {
        build(&mut self.request)?;
        self.send_request_get_response()?;
        Ok(&self.response)
    }

    /// Send the current request and wait for the response carrying the same
    /// command id, resending after each timed out attempt.
    ///
    /// A lost link aborts immediately without retrying.
    pub fn send_request_get_response(&mut self) -> Result<(), ProtocolError> {
        if self.request.is_empty() {
            return Err(ProtocolError::InvalidParameter(
                "no request has been built".into(),
            ));
        }

        let command_id = self.request.command_id();
        let attempts = self.request_retries;

        for attempt in 1..=attempts {
            debug!(
                "sending request: command {} attempt {}/{} {:02x?}",
                command_id,
                attempt,
                attempts,
                self.request.as_bytes()
            );

            // Borrow the request bytes and the transport separately
            let Self {
                transport,
                request,
                counters,
                ..
            } = self;
            match transport.send(request.as_bytes()) {
                Ok(0) => {
                    error!("send of command {} failed: link lost", command_id);
                    return Err(ProtocolError::TransportFatal(TransportError::LinkLost));
                }
                Ok(written) => {
                    counters.tx_bytes = counters.tx_bytes.saturating_add(written as u64);
                    counters.tx_frames = counters.tx_frames.saturating_add(1);
                }
                Err(e) => {
                    error!("send of command {} failed: {}", command_id, e);
                    return Err(ProtocolError::TransportFatal(e));
                }
            }

            match self.wait_for_response(CommandFilter::Id(command_id), self.response_timeout_ms) {
                Ok(WaitStatus::Ready) => return Ok(()),
                Ok(WaitStatus::Again) | Err(ProtocolError::Timeout) => {
                    warn!(
                        "timeout waiting for command {}: {} attempts remaining",
                        command_id,
                        attempts - attempt
                    );
                    if attempt < attempts {
                        self.counters.retries = self.counters.retries.saturating_add(1);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(ProtocolError::RetriesExceeded { attempts })
    }

    /// Wait for the next complete frame accepted by `filter`.
    ///
    /// With `timeout_ms == 0` this drains whatever the transport has ready
    /// and returns [`WaitStatus::Again`] if no matching frame completed.
    /// Otherwise it waits until the deadline and fails with
    /// [`ProtocolError::Timeout`]. Frames that do not match are dropped.
    pub fn wait_for_response(
        &mut self,
        filter: impl Into<CommandFilter>,
        timeout_ms: u32,
    ) -> Result<WaitStatus, ProtocolError> {
        let filter = filter.into();
        let timeout_ms = timeout_ms.min(i32::MAX as u32);
        let deadline = if timeout_ms == 0 {
            None
        } else {
            Some(self.transport.now_ms().wrapping_add(timeout_ms))
        };

        loop {
            let remaining = match deadline {
                Some(deadline) => remaining_ms(deadline, self.transport.now_ms()),
                None => 0,
            };

            let mut byte = [0u8; 1];
            let read = self.transport.receive(&mut byte, remaining).map_err(|e| {
                error!("receive failed: {}", e);
                ProtocolError::TransportFatal(e)
            })?;

            if read > 0 {
                self.counters.rx_bytes = self.counters.rx_bytes.saturating_add(1);

                if self.response.feed(byte[0]) == FeedStatus::FrameComplete {
                    self.counters.rx_frames = self.counters.rx_frames.saturating_add(1);

                    if let Some(command_id) = self.response.command_id() {
                        if filter.matches(command_id) {
                            return Ok(WaitStatus::Ready);
                        }
                        debug!(
                            "discarding frame for command {} while waiting for {:?}",
                            command_id, filter
                        );
                    }
                }
            } else if deadline.is_none() {
                return Ok(WaitStatus::Again);
            } else if remaining == 0 {
                return Err(ProtocolError::Timeout);
            }
        }
    }
}

/// Milliseconds left until `deadline`, robust to the clock wrapping
fn remaining_ms(deadline: u32, now: u32) -> u32 {
    let diff = deadline.wrapping_sub(now) as i32;
    if diff > 0 {
        diff as u32
    } else {
        0
    }
}
