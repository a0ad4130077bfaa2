//! Millisecond clock
//!
//! Each connection owns its clock; there is no process-wide time origin.

use std::time::{Duration, Instant};

/// Monotonic millisecond time source
pub trait Clock {
    /// Milliseconds since the clock's origin, wrapping at 32 bits
    fn now_ms(&self) -> u32;

    /// Sleep for `duration_ms`
    fn sleep_ms(&self, duration_ms: u32);
}

/// Clock backed by [`Instant`], with its origin at construction
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose origin is now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        // Truncation gives the required 32-bit wrap
        self.origin.elapsed().as_millis() as u32
    }

    fn sleep_ms(&self, duration_ms: u32) {
        std::thread::sleep(Duration::from_millis(duration_ms as u64));
    }
}
