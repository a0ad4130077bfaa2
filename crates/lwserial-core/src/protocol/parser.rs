//! Streaming frame parser
//!
//! Rebuilds one frame at a time from an arbitrary byte stream, one byte per
//! call. Corrupt input is never reported as an error: the parser drops back
//! to scanning for the next sync byte and counts the rejection.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::frame::STRING_FIELD_SIZE;
use super::{crc16, ProtocolError, HEADER_SIZE, RESPONSE_CAPACITY, START_BYTE};

/// Largest payload length (command id + data) that fits the receive buffer
const MAX_PAYLOAD_LENGTH: usize = RESPONSE_CAPACITY - 5;

/// Parser state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseState {
    /// Scanning for the sync byte
    Start,
    /// Expecting the low flags byte
    FlagsLow,
    /// Expecting the high flags byte
    FlagsHigh,
    /// Collecting payload and CRC
    Payload,
    /// A validated frame is held in the buffer
    Done,
}

/// Result of feeding one byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// No complete frame yet
    NeedMoreData,
    /// A frame passed its CRC check and is available
    FrameComplete,
    /// The parser was advanced while holding a completed frame without
    /// being reset first
    AlreadyComplete,
}

/// Receive buffer and parse state for inbound frames
#[derive(Clone)]
pub struct Response {
    data: [u8; RESPONSE_CAPACITY],
    size: usize,
    payload_length: usize,
    state: ParseState,
    command_id: Option<u8>,
    rejected: u64,
}

impl Response {
    /// Create an empty response in the `Start` state
    pub fn new() -> Self {
        Self {
            data: [0u8; RESPONSE_CAPACITY],
            size: 0,
            payload_length: 0,
            state: ParseState::Start,
            command_id: None,
            rejected: 0,
        }
    }

    /// Discard any partial or completed frame and scan for a new one.
    /// The rejected-frame count is kept.
    pub fn reset(&mut self) {
        self.size = 0;
        self.payload_length = 0;
        self.state = ParseState::Start;
        self.command_id = None;
    }

    /// Current parse state
    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Command id of the completed frame
    pub fn command_id(&self) -> Option<u8> {
        self.command_id
    }

    /// Whether a validated frame is held
    pub fn is_complete(&self) -> bool {
        self.state == ParseState::Done
    }

    /// Number of data bytes declared by the current frame (excluding the
    /// command id)
    pub fn payload_size(&self) -> usize {
        self.payload_length.saturating_sub(1)
    }

    /// Number of frames dropped for a bad length or CRC since creation
    pub fn rejected_frames(&self) -> u64 {
        self.rejected
    }

    /// Raw bytes of the completed frame, including header and CRC
    pub fn frame(&self) -> Option<&[u8]> {
        self.is_complete().then(|| &self.data[..self.size])
    }

    /// Data bytes of the completed frame (after the command id, before the CRC)
    pub fn payload(&self) -> &[u8] {
        if self.is_complete() {
            &self.data[HEADER_SIZE..self.size - 2]
        } else {
            &[]
        }
    }

    /// Feed one byte. A completed frame is discarded automatically before the
    /// byte is processed, so callers can keep streaming.
    pub fn feed(&mut self, byte: u8) -> FeedStatus {
        if self.state == ParseState::Done {
            self.reset();
        }
        self.advance(byte)
    }

    fn advance(&mut self, byte: u8) -> FeedStatus {
        trace!("feed byte 0x{:02x} in {:?}", byte, self.state);

        match self.state {
            ParseState::Start => {
                if byte == START_BYTE {
                    self.data[0] = byte;
                    self.size = 1;
                    self.state = ParseState::FlagsLow;
                }
            }
            ParseState::FlagsLow => {
                self.data[1] = byte;
                self.size = 2;
                self.state = ParseState::FlagsHigh;
            }
            ParseState::FlagsHigh => {
                self.data[2] = byte;
                self.size = 3;
                self.payload_length = (LittleEndian::read_u16(&self.data[1..3]) >> 6) as usize;

                // Must be checked before any payload byte is stored
                if self.payload_length < 1 || self.payload_length > MAX_PAYLOAD_LENGTH {
                    debug!("rejecting frame: invalid payload length {}", self.payload_length);
                    self.reject();
                } else {
                    self.state = ParseState::Payload;
                }
            }
            ParseState::Payload => {
                self.data[self.size] = byte;
                self.size += 1;

                if self.size == self.payload_length + 5 {
                    let crc_at = self.size - 2;
                    let received = LittleEndian::read_u16(&self.data[crc_at..self.size]);
                    let expected = crc16(&self.data[..crc_at]);

                    if received == expected {
                        self.state = ParseState::Done;
                        self.command_id = Some(self.data[3]);
                        debug!(
                            "received frame: command {} ({} bytes) {:02x?}",
                            self.data[3],
                            self.size,
                            &self.data[..self.size]
                        );
                        return FeedStatus::FrameComplete;
                    }

                    debug!(
                        "rejecting frame: CRC mismatch, expected {:#06x}, got {:#06x}",
                        expected, received
                    );
                    self.reject();
                }
            }
            ParseState::Done => return FeedStatus::AlreadyComplete,
        }

        FeedStatus::NeedMoreData
    }

    fn reject(&mut self) {
        self.rejected = self.rejected.saturating_add(1);
        self.reset();
    }

    /// Check that the completed frame carries `expected`
    pub fn expect_command(&self, expected: u8) -> Result<(), ProtocolError> {
        match self.command_id {
            Some(actual) if self.is_complete() && actual == expected => Ok(()),
            Some(actual) if self.is_complete() => {
                Err(ProtocolError::CommandIdMismatch { expected, actual })
            }
            _ => Err(ProtocolError::IncompleteFrame),
        }
    }

    fn field(&self, offset: usize, size: usize) -> Result<&[u8], ProtocolError> {
        if !self.is_complete() {
            return Err(ProtocolError::IncompleteFrame);
        }

        let payload = self.payload();
        match offset.checked_add(size) {
            Some(end) if end <= payload.len() => Ok(&payload[offset..end]),
            _ => Err(ProtocolError::FieldOutOfBounds {
                offset,
                size,
                available: payload.len(),
            }),
        }
    }

    /// Read a `u8` at `offset` into the data
    pub fn read_u8(&self, offset: usize) -> Result<u8, ProtocolError> {
        Ok(self.field(offset, 1)?[0])
    }

    /// Read an `i8` at `offset` into the data
    pub fn read_i8(&self, offset: usize) -> Result<i8, ProtocolError> {
        Ok(self.field(offset, 1)?[0] as i8)
    }

    /// Read a little-endian `u16` at `offset` into the data
    pub fn read_u16(&self, offset: usize) -> Result<u16, ProtocolError> {
        Ok(LittleEndian::read_u16(self.field(offset, 2)?))
    }

    /// Read a little-endian `i16` at `offset` into the data
    pub fn read_i16(&self, offset: usize) -> Result<i16, ProtocolError> {
        Ok(LittleEndian::read_i16(self.field(offset, 2)?))
    }

    /// Read a little-endian `u32` at `offset` into the data
    pub fn read_u32(&self, offset: usize) -> Result<u32, ProtocolError> {
        Ok(LittleEndian::read_u32(self.field(offset, 4)?))
    }

    /// Read a little-endian `i32` at `offset` into the data
    pub fn read_i32(&self, offset: usize) -> Result<i32, ProtocolError> {
        Ok(LittleEndian::read_i32(self.field(offset, 4)?))
    }

    /// Read a 16-byte NUL-padded string field at `offset` into the data
    pub fn read_string(&self, offset: usize) -> Result<String, ProtocolError> {
        let field = self.field(offset, STRING_FIELD_SIZE)?;
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        Ok(String::from_utf8_lossy(&field[..end]).into_owned())
    }

    /// Read `len` raw bytes at `offset` into the data
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<&[u8], ProtocolError> {
        self.field(offset, len)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("state", &self.state)
            .field("command_id", &self.command_id)
            .field("payload_size", &self.payload_size())
            .field("bytes", &&self.data[..self.size])
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_frame;

    fn feed_all(response: &mut Response, bytes: &[u8]) -> Vec<FeedStatus> {
        bytes.iter().map(|&b| response.feed(b)).collect()
    }

    #[test]
    fn test_state_progression() {
        let frame = encode_frame(44, false, &[]).unwrap();
        let mut response = Response::new();

        assert_eq!(response.feed(frame[0]), FeedStatus::NeedMoreData);
        assert_eq!(response.state(), ParseState::FlagsLow);
        assert_eq!(response.feed(frame[1]), FeedStatus::NeedMoreData);
        assert_eq!(response.state(), ParseState::FlagsHigh);
        assert_eq!(response.feed(frame[2]), FeedStatus::NeedMoreData);
        assert_eq!(response.state(), ParseState::Payload);
        assert_eq!(response.feed(frame[3]), FeedStatus::NeedMoreData);
        assert_eq!(response.feed(frame[4]), FeedStatus::NeedMoreData);
        assert_eq!(response.feed(frame[5]), FeedStatus::FrameComplete);
        assert_eq!(response.state(), ParseState::Done);
        assert_eq!(response.command_id(), Some(44));
        assert_eq!(response.payload_size(), 0);
    }

    #[test]
    fn test_ignores_noise_before_sync() {
        let mut response = Response::new();
        for b in [0x00, 0x55, 0xFF, 0x13] {
            assert_eq!(response.feed(b), FeedStatus::NeedMoreData);
            assert_eq!(response.state(), ParseState::Start);
        }
        assert_eq!(response.rejected_frames(), 0);
    }

    #[test]
    fn test_zero_payload_length_rejected() {
        let mut response = Response::new();
        feed_all(&mut response, &[0xAA, 0x00, 0x00]);
        assert_eq!(response.state(), ParseState::Start);
        assert_eq!(response.rejected_frames(), 1);
    }

    #[test]
    fn test_oversized_length_rejected_before_payload() {
        let mut response = Response::new();
        // Declares the maximum 10-bit length (1023)
        feed_all(&mut response, &[0xAA, 0xC0, 0xFF]);
        assert_eq!(response.state(), ParseState::Start);
        assert_eq!(response.rejected_frames(), 1);

        // Payload bytes that follow are scanned as noise, never stored
        let statuses = feed_all(&mut response, &[0x01; 2048]);
        assert!(statuses.iter().all(|s| *s == FeedStatus::NeedMoreData));
        assert_eq!(response.state(), ParseState::Start);
    }

    #[test]
    fn test_largest_accepted_frame() {
        let data = vec![0x11; RESPONSE_CAPACITY - 6];
        let frame = encode_frame(7, true, &data).unwrap();
        assert_eq!(frame.len(), RESPONSE_CAPACITY);

        let mut response = Response::new();
        let statuses = feed_all(&mut response, &frame);
        assert_eq!(statuses.last(), Some(&FeedStatus::FrameComplete));
        assert_eq!(response.payload(), data.as_slice());
    }

    #[test]
    fn test_one_past_capacity_rejected() {
        let data = vec![0x11; RESPONSE_CAPACITY - 5];
        let frame = encode_frame(7, true, &data).unwrap();

        let mut response = Response::new();
        let statuses = feed_all(&mut response, &frame);
        assert!(!statuses.contains(&FeedStatus::FrameComplete));
        assert_eq!(response.rejected_frames(), 1);
    }

    #[test]
    fn test_bad_crc_rejected() {
        let mut frame = encode_frame(3, false, &[1, 2, 3]).unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0x01;

        let mut response = Response::new();
        let statuses = feed_all(&mut response, &frame);
        assert!(!statuses.contains(&FeedStatus::FrameComplete));
        assert_eq!(response.state(), ParseState::Start);
        assert_eq!(response.rejected_frames(), 1);
    }

    #[test]
    fn test_implicit_reset_after_done() {
        let first = encode_frame(1, false, &[9]).unwrap();
        let second = encode_frame(2, false, &[8, 7]).unwrap();

        let mut response = Response::new();
        feed_all(&mut response, &first);
        assert_eq!(response.command_id(), Some(1));

        let statuses = feed_all(&mut response, &second);
        assert_eq!(statuses.last(), Some(&FeedStatus::FrameComplete));
        assert_eq!(response.command_id(), Some(2));
        assert_eq!(response.payload(), &[8, 7]);
    }

    #[test]
    fn test_advance_while_done_is_violation() {
        let frame = encode_frame(1, false, &[]).unwrap();
        let mut response = Response::new();
        feed_all(&mut response, &frame);

        assert_eq!(response.advance(0xAA), FeedStatus::AlreadyComplete);
        // The held frame is untouched
        assert_eq!(response.command_id(), Some(1));
        assert_eq!(response.state(), ParseState::Done);
    }

    #[test]
    fn test_explicit_reset_discards_partial() {
        let frame = encode_frame(5, false, &[1, 2]).unwrap();
        let mut response = Response::new();
        feed_all(&mut response, &frame[..4]);
        response.reset();
        assert_eq!(response.state(), ParseState::Start);

        let statuses = feed_all(&mut response, &frame);
        assert_eq!(statuses.last(), Some(&FeedStatus::FrameComplete));
    }

    #[test]
    fn test_typed_reads() {
        let data = [
            0xFE, // i8 -2
            0x34, 0x12, // u16 0x1234
            0xFF, 0xFF, 0xFF, 0xFF, // i32 -1
            b'G', b'R', b'F', b'-', b'2', b'5', b'0', 0, 0, 0, 0, 0, 0, 0, 0, 0,
        ];
        let frame = encode_frame(0, false, &data).unwrap();
        let mut response = Response::new();
        feed_all(&mut response, &frame);

        assert_eq!(response.read_i8(0).unwrap(), -2);
        assert_eq!(response.read_u8(0).unwrap(), 0xFE);
        assert_eq!(response.read_u16(1).unwrap(), 0x1234);
        assert_eq!(response.read_i16(1).unwrap(), 0x1234);
        assert_eq!(response.read_i32(3).unwrap(), -1);
        assert_eq!(response.read_u32(3).unwrap(), u32::MAX);
        assert_eq!(response.read_string(7).unwrap(), "GRF-250");
        assert_eq!(response.read_bytes(1, 2).unwrap(), &[0x34, 0x12]);
    }

    #[test]
    fn test_read_out_of_bounds() {
        let frame = encode_frame(0, false, &[1, 2, 3]).unwrap();
        let mut response = Response::new();
        feed_all(&mut response, &frame);

        match response.read_u32(0) {
            Err(ProtocolError::FieldOutOfBounds {
                offset,
                size,
                available,
            }) => {
                assert_eq!((offset, size, available), (0, 4, 3));
            }
            other => panic!("Expected FieldOutOfBounds, got {:?}", other),
        }
        assert!(response.read_bytes(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_read_before_complete() {
        let response = Response::new();
        assert!(matches!(
            response.read_u8(0),
            Err(ProtocolError::IncompleteFrame)
        ));
        assert!(response.payload().is_empty());
        assert!(response.frame().is_none());
    }

    #[test]
    fn test_expect_command() {
        let frame = encode_frame(30, false, &[5, 0, 0, 0]).unwrap();
        let mut response = Response::new();
        feed_all(&mut response, &frame);

        assert!(response.expect_command(30).is_ok());
        match response.expect_command(44) {
            Err(ProtocolError::CommandIdMismatch { expected, actual }) => {
                assert_eq!(expected, 44);
                assert_eq!(actual, 30);
            }
            other => panic!("Expected CommandIdMismatch, got {:?}", other),
        }
    }
}
