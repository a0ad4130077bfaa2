//! Transport abstraction
//!
//! The protocol engine reaches the outside world only through [`Transport`]:
//! a millisecond clock, a sleep, a blocking send and a bounded receive.
//! Backends are picked at construction; [`SerialTransport`] drives a real
//! port and [`MockTransport`] scripts the link for tests.

mod clock;
pub mod mock;
mod serial;

use thiserror::Error;

pub use clock::{Clock, SystemClock};
pub use mock::MockTransport;
pub use serial::{open_port, SerialTransport};

/// Fatal transport failures. The link is considered lost.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Link lost")]
    LinkLost,

    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serialport::Error> for TransportError {
    fn from(e: serialport::Error) -> Self {
        TransportError::Serial(e.to_string())
    }
}

/// The four operations a connection needs from its environment
pub trait Transport {
    /// Milliseconds since an arbitrary origin. Wraps at 32 bits.
    fn now_ms(&mut self) -> u32;

    /// Sleep for up to `duration_ms`. May return early.
    fn sleep_ms(&mut self, duration_ms: u32);

    /// Write all of `data`, returning the number of bytes written.
    /// `Ok(0)` and `Err` both mean the link is lost.
    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read up to `buf.len()` bytes.
    ///
    /// With `timeout_ms == 0` this is a single non-blocking attempt. Otherwise
    /// it may block up to `timeout_ms` but is free to return early with fewer
    /// bytes (including none). `Err` means the link is lost.
    fn receive(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn now_ms(&mut self) -> u32 {
        (**self).now_ms()
    }

    fn sleep_ms(&mut self, duration_ms: u32) {
        (**self).sleep_ms(duration_ms)
    }

    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        (**self).send(data)
    }

    fn receive(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, TransportError> {
        (**self).receive(buf, timeout_ms)
    }
}
