//! Frame encoding
//!
//! Frame format (all multi-byte fields little-endian):
//! - 1 byte: sync marker `0xAA`
//! - 2 bytes: flags, bit 0 = write, bits 6-15 = payload length
//!   (command id + data)
//! - 1 byte: command id
//! - N bytes: data
//! - 2 bytes: CRC16 over every preceding byte

use byteorder::{ByteOrder, LittleEndian};

use super::{crc16, ProtocolError, FRAME_OVERHEAD, HEADER_SIZE, REQUEST_CAPACITY, START_BYTE};

/// Largest payload length the 10-bit flags field can describe
const MAX_PAYLOAD_LENGTH: usize = 0x3FF;

/// Width of fixed string fields
pub(crate) const STRING_FIELD_SIZE: usize = 16;

/// Encode a frame into a new buffer
pub fn encode_frame(command_id: u8, is_write: bool, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    check_data_size(data.len(), usize::MAX)?;
    let mut bytes = vec![0u8; data.len() + FRAME_OVERHEAD];
    write_frame(&mut bytes, command_id, is_write, data);
    Ok(bytes)
}

fn check_data_size(size: usize, capacity: usize) -> Result<(), ProtocolError> {
    let max = capacity
        .saturating_sub(FRAME_OVERHEAD)
        .min(MAX_PAYLOAD_LENGTH - 1);
    if size > max {
        return Err(ProtocolError::InvalidParameter(format!(
            "payload of {} bytes exceeds maximum of {}",
            size, max
        )));
    }
    Ok(())
}

/// Write a frame into `out`, which must hold `data.len() + FRAME_OVERHEAD` bytes.
/// Returns the frame size.
fn write_frame(out: &mut [u8], command_id: u8, is_write: bool, data: &[u8]) -> usize {
    let payload_length = (1 + data.len()) as u16;
    let flags = (payload_length << 6) | is_write as u16;
    let crc_at = HEADER_SIZE + data.len();

    out[0] = START_BYTE;
    LittleEndian::write_u16(&mut out[1..3], flags);
    out[3] = command_id;
    out[HEADER_SIZE..crc_at].copy_from_slice(data);

    let crc = crc16(&out[..crc_at]);
    LittleEndian::write_u16(&mut out[crc_at..crc_at + 2], crc);

    crc_at + 2
}

/// An outbound request frame
///
/// The buffer is reused: every `read`/`write_*` call rebuilds the frame from
/// scratch and nothing of the previous request survives.
#[derive(Clone)]
pub struct Request {
    data: [u8; REQUEST_CAPACITY],
    size: usize,
    command_id: u8,
}

impl Request {
    /// Create an empty request
    pub fn new() -> Self {
        Self {
            data: [0u8; REQUEST_CAPACITY],
            size: 0,
            command_id: 0,
        }
    }

    /// Create a read request for `command_id`
    pub fn read(command_id: u8) -> Self {
        let mut request = Self::new();
        request.set_read(command_id);
        request
    }

    /// Command id of the current request
    pub fn command_id(&self) -> u8 {
        self.command_id
    }

    /// Encoded frame bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.size]
    }

    /// Encoded frame size
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether no request has been built yet
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Whether the current request is a write
    pub fn is_write(&self) -> bool {
        self.size > 0 && self.data[1] & 0x01 != 0
    }

    fn fill(&mut self, command_id: u8, is_write: bool, data: &[u8]) {
        self.size = write_frame(&mut self.data, command_id, is_write, data);
        self.command_id = command_id;
    }

    /// Build a read request. Reads carry no data.
    pub fn set_read(&mut self, command_id: u8) {
        self.fill(command_id, false, &[]);
    }

    /// Build a write request carrying an `i8`
    pub fn set_write_i8(&mut self, command_id: u8, value: i8) {
        self.fill(command_id, true, &[value as u8]);
    }

    /// Build a write request carrying an `i16`
    pub fn set_write_i16(&mut self, command_id: u8, value: i16) {
        let mut buf = [0u8; 2];
        LittleEndian::write_i16(&mut buf, value);
        self.fill(command_id, true, &buf);
    }

    /// Build a write request carrying an `i32`
    pub fn set_write_i32(&mut self, command_id: u8, value: i32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_i32(&mut buf, value);
        self.fill(command_id, true, &buf);
    }

    /// Build a write request carrying a `u8`
    pub fn set_write_u8(&mut self, command_id: u8, value: u8) {
        self.fill(command_id, true, &[value]);
    }

    /// Build a write request carrying a `u16`
    pub fn set_write_u16(&mut self, command_id: u8, value: u16) {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, value);
        self.fill(command_id, true, &buf);
    }

    /// Build a write request carrying a `u32`
    pub fn set_write_u32(&mut self, command_id: u8, value: u32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, value);
        self.fill(command_id, true, &buf);
    }

    /// Build a write request carrying a 16-byte string field.
    /// Shorter strings are NUL padded.
    pub fn set_write_string(&mut self, command_id: u8, value: &str) -> Result<(), ProtocolError> {
        let bytes = value.as_bytes();
        if bytes.len() > STRING_FIELD_SIZE {
            return Err(ProtocolError::InvalidParameter(format!(
                "string of {} bytes exceeds {}-byte field",
                bytes.len(),
                STRING_FIELD_SIZE
            )));
        }

        let mut field = [0u8; STRING_FIELD_SIZE];
        field[..bytes.len()].copy_from_slice(bytes);
        self.fill(command_id, true, &field);
        Ok(())
    }

    /// Build a write request carrying arbitrary data
    pub fn set_write_data(&mut self, command_id: u8, data: &[u8]) -> Result<(), ProtocolError> {
        check_data_size(data.len(), REQUEST_CAPACITY)?;
        self.fill(command_id, true, data);
        Ok(())
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("command_id", &self.command_id)
            .field("bytes", &self.as_bytes())
            .finish()
    }
}
