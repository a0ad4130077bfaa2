//! Serial port transport
//!
//! Drives the sensor over a `serialport` handle opened 8N1 without flow
//! control.

use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::{debug, error};

use super::{Clock, SystemClock, Transport, TransportError};

/// Open a serial port for the sensor (8 data bits, no parity, 1 stop bit)
pub fn open_port(name: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>, TransportError> {
    let port = serialport::new(name, baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(Duration::from_millis(1))
        .open()?;

    debug!("opened serial port {} at {} baud", name, baud_rate);
    Ok(port)
}

/// [`Transport`] over a serial port
pub struct SerialTransport<C: Clock = SystemClock> {
    port: Box<dyn SerialPort>,
    clock: C,
    read_timeout_ms: u32,
}

impl SerialTransport<SystemClock> {
    /// Open `name` at `baud_rate` with a fresh system clock
    pub fn open(name: &str, baud_rate: u32) -> Result<Self, TransportError> {
        Ok(Self::new(open_port(name, baud_rate)?, SystemClock::new()))
    }
}

impl<C: Clock> SerialTransport<C> {
    /// Wrap an already opened port
    pub fn new(port: Box<dyn SerialPort>, clock: C) -> Self {
        Self {
            port,
            clock,
            read_timeout_ms: 1,
        }
    }

    /// Name of the underlying port, if known
    pub fn port_name(&self) -> Option<String> {
        self.port.name()
    }

    /// Discard anything pending in the port buffers
    pub fn clear_buffers(&mut self) -> Result<(), TransportError> {
        self.port.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout_ms: u32) -> Result<(), TransportError> {
        if self.read_timeout_ms != timeout_ms {
            self.port
                .set_timeout(Duration::from_millis(timeout_ms as u64))?;
            self.read_timeout_ms = timeout_ms;
        }
        Ok(())
    }
}

impl<C: Clock> Transport for SerialTransport<C> {
    fn now_ms(&mut self) -> u32 {
        self.clock.now_ms()
    }

    fn sleep_ms(&mut self, duration_ms: u32) {
        self.clock.sleep_ms(duration_ms);
    }

    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        // No flush: tcdrain blocks indefinitely on some USB CDC adapters
        self.port.write_all(data).map_err(|e| {
            error!("serial write failed: {}", e);
            TransportError::Io(e)
        })?;
        Ok(data.len())
    }

    fn receive(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, TransportError> {
        if buf.is_empty() {
            return Ok(0);
        }

        if timeout_ms == 0 {
            if self.port.bytes_to_read()? == 0 {
                return Ok(0);
            }
        } else {
            self.set_read_timeout(timeout_ms)?;
        }

        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(ref e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                Ok(0)
            }
            Err(e) => {
                error!("serial read failed: {}", e);
                Err(TransportError::Io(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_port_fails() {
        let result = SerialTransport::open("/dev/lwserial-does-not-exist", 115200);
        assert!(matches!(result, Err(TransportError::Serial(_))));
    }
}
