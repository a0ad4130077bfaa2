//! Device CRC16
//!
//! Table-free shift and xor sequence used by the sensor firmware. Every
//! intermediate value is truncated to 16 bits.

/// Calculate the CRC16 of `data`
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;

    for &byte in data {
        let mut code = (crc >> 8) ^ byte as u16;
        code ^= code >> 4;
        crc <<= 8;
        crc ^= code;
        code <<= 5;
        crc ^= code;
        code <<= 7;
        crc ^= code;
    }

    crc
}
