//! Firmware version decoding

use serde::{Deserialize, Serialize};
use std::fmt;

/// Firmware version expanded from its packed `0x00MMmmpp` form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl FirmwareVersion {
    /// Expand a packed version as reported by the device
    pub fn from_u32(version: u32) -> Self {
        Self {
            major: (version >> 16) as u8,
            minor: (version >> 8) as u8,
            patch: version as u8,
        }
    }

    /// Pack back into the device representation
    pub fn to_u32(self) -> u32 {
        (self.major as u32) << 16 | (self.minor as u32) << 8 | self.patch as u32
    }
}

impl From<u32> for FirmwareVersion {
    fn from(version: u32) -> Self {
        Self::from_u32(version)
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
