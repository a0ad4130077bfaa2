//! In-memory transport for tests
//!
//! Runs on a virtual clock: a blocking receive that finds nothing advances
//! time by at most one tick, so timeouts elapse instantly and
//! deterministically.

use std::collections::VecDeque;

use super::{Transport, TransportError};

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8>>;

/// Default virtual time consumed by an empty blocking receive
pub const DEFAULT_TICK_MS: u32 = 50;

/// Scripted [`Transport`] with a virtual clock
pub struct MockTransport {
    now: u32,
    tick_ms: u32,
    inbound: VecDeque<u8>,
    sent: Vec<Vec<u8>>,
    responder: Option<Responder>,
    send_calls: usize,
    receive_calls: usize,
    slept_ms: u64,
    fail_sends: bool,
    fail_receive_from: Option<usize>,
}

impl MockTransport {
    /// Create a mock with the clock at zero and nothing to read
    pub fn new() -> Self {
        Self {
            now: 0,
            tick_ms: DEFAULT_TICK_MS,
            inbound: VecDeque::new(),
            sent: Vec::new(),
            responder: None,
            send_calls: 0,
            receive_calls: 0,
            slept_ms: 0,
            fail_sends: false,
            fail_receive_from: None,
        }
    }

    /// Start the virtual clock at `now_ms`
    pub fn with_start_time(mut self, now_ms: u32) -> Self {
        self.now = now_ms;
        self
    }

    /// Set how much virtual time an empty blocking receive consumes
    pub fn with_tick(mut self, tick_ms: u32) -> Self {
        self.tick_ms = tick_ms.max(1);
        self
    }

    /// Reply to every send with the bytes produced by `responder`
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<u8> + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Make every send report a lost link
    pub fn fail_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    /// Make receive fail from its `call`-th invocation on (1-based)
    pub fn fail_receive_from(mut self, call: usize) -> Self {
        self.fail_receive_from = Some(call);
        self
    }

    /// Queue bytes for the engine to read
    pub fn push_inbound(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes);
    }

    /// Bytes still waiting to be read
    pub fn pending_inbound(&self) -> usize {
        self.inbound.len()
    }

    /// Every buffer passed to `send`, in order
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Number of `send` calls, including failed ones
    pub fn send_calls(&self) -> usize {
        self.send_calls
    }

    /// Number of `receive` calls
    pub fn receive_calls(&self) -> usize {
        self.receive_calls
    }

    /// Total virtual time spent in `sleep_ms`
    pub fn slept_ms(&self) -> u64 {
        self.slept_ms
    }

    /// Current virtual time
    pub fn now(&self) -> u32 {
        self.now
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn now_ms(&mut self) -> u32 {
        self.now
    }

    fn sleep_ms(&mut self, duration_ms: u32) {
        self.now = self.now.wrapping_add(duration_ms);
        self.slept_ms += duration_ms as u64;
    }

    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.send_calls += 1;
        if self.fail_sends {
            return Ok(0);
        }

        self.sent.push(data.to_vec());
        if let Some(responder) = self.responder.as_mut() {
            let reply = responder(data);
            self.inbound.extend(reply);
        }
        Ok(data.len())
    }

    fn receive(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, TransportError> {
        self.receive_calls += 1;
        if matches!(self.fail_receive_from, Some(call) if self.receive_calls >= call) {
            return Err(TransportError::LinkLost);
        }

        if !self.inbound.is_empty() {
            let n = buf.len().min(self.inbound.len());
            for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
                *slot = byte;
            }
            return Ok(n);
        }

        if timeout_ms > 0 {
            self.now = self.now.wrapping_add(timeout_ms.min(self.tick_ms));
        }
        Ok(0)
    }
}
