//! Serial Protocol Communication
//!
//! Implements the LightWare binary serial protocol: frame encoding with the
//! device CRC16, a streaming frame parser, and a managed request/response
//! engine with retries and timeouts on top of an abstract [`Transport`].
//!
//! [`Transport`]: crate::transport::Transport

mod connection;
mod crc;
mod error;
mod frame;
mod parser;
mod version;

pub use connection::{CommandFilter, Connection, LinkCounters, WaitStatus};
pub use crc::crc16;
pub use error::ProtocolError;
pub use frame::{encode_frame, Request};
pub use parser::{FeedStatus, ParseState, Response};
pub use version::FirmwareVersion;

/// Leading sync marker of every frame
pub const START_BYTE: u8 = 0xAA;

/// Capacity of the outbound request buffer
pub const REQUEST_CAPACITY: usize = 160;

/// Capacity of the receive buffer
#[cfg(not(feature = "large-packets"))]
pub const RESPONSE_CAPACITY: usize = 64;

/// Capacity of the receive buffer
#[cfg(feature = "large-packets")]
pub const RESPONSE_CAPACITY: usize = 1024;

/// Sync byte, two flag bytes and the command id
pub const HEADER_SIZE: usize = 4;

/// Bytes of framing around the data payload (header + CRC)
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + 2;

/// Number of times a request is sent before giving up
pub const REQUEST_RETRIES: u32 = 4;

/// Default time to wait for a response to each attempt
pub const RESPONSE_TIMEOUT_MS: u32 = 1000;

/// Wire-level sentinel for "any command id"
pub const ANY_COMMAND: u8 = 255;

/// Default baud rate for the sensor's serial interface
pub const DEFAULT_BAUD_RATE: u32 = 115200;
