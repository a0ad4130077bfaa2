//! GRF-250 parameter and measurement types

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::commands;
use crate::protocol::{FirmwareVersion, ProtocolError, Response};

/// Number of returns reported by a multi data frame
pub const MULTI_SIGNAL_COUNT: usize = 5;

/// Size of the user data block
pub const USER_DATA_SIZE: usize = 16;

bitflags! {
    /// Fields included in distance data output
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DistanceConfig: u32 {
        const FIRST_RETURN_RAW = 1 << 0;
        const FIRST_RETURN_FILTERED = 1 << 1;
        const FIRST_RETURN_STRENGTH = 1 << 2;
        const LAST_RETURN_RAW = 1 << 3;
        const LAST_RETURN_FILTERED = 1 << 4;
        const LAST_RETURN_STRENGTH = 1 << 5;
        const TEMPERATURE = 1 << 6;
        const ALARM_STATUS = 1 << 7;
    }
}

/// Declare a fieldless enum with a fixed wire value per variant
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident = $value:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value),+
        }

        impl TryFrom<u32> for $name {
            type Error = u32;

            fn try_from(value: u32) -> Result<Self, Self::Error> {
                match value {
                    $(v if v == $value => Ok($name::$variant),)+
                    other => Err(other),
                }
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> u32 {
                value as u32
            }
        }
    };
}

wire_enum! {
    /// Which data the sensor pushes without being asked
    Stream {
        None = 0,
        Distance = 5,
        Multi = 6,
    }
}

wire_enum! {
    /// On/off setting
    Enable {
        Disabled = 0,
        Enabled = 1,
    }
}

wire_enum! {
    /// Return used to evaluate the alarms
    ReturnMode {
        First = 0,
        Last = 1,
    }
}

wire_enum! {
    /// Function of the GPIO pin
    GpioMode {
        NoOutput = 0,
        AlarmA = 1,
        AlarmB = 2,
    }
}

wire_enum! {
    /// Serial baud rate setting
    BaudRate {
        Baud9600 = 0,
        Baud19200 = 1,
        Baud38400 = 2,
        Baud57600 = 3,
        Baud115200 = 4,
        Baud230400 = 5,
        Baud460800 = 6,
        Baud921600 = 7,
    }
}

impl Enable {
    /// Whether the setting is on
    pub fn is_enabled(self) -> bool {
        self == Enable::Enabled
    }
}

impl From<bool> for Enable {
    fn from(enabled: bool) -> Self {
        if enabled {
            Enable::Enabled
        } else {
            Enable::Disabled
        }
    }
}

impl BaudRate {
    /// Line speed in bits per second
    pub fn bits_per_second(self) -> u32 {
        match self {
            BaudRate::Baud9600 => 9600,
            BaudRate::Baud19200 => 19200,
            BaudRate::Baud38400 => 38400,
            BaudRate::Baud57600 => 57600,
            BaudRate::Baud115200 => 115200,
            BaudRate::Baud230400 => 230400,
            BaudRate::Baud460800 => 460800,
            BaudRate::Baud921600 => 921600,
        }
    }
}

/// Decode a wire enum, reporting unknown values against `command_id`
pub(crate) fn decode<E: TryFrom<u32, Error = u32>>(
    command_id: u8,
    value: u32,
) -> Result<E, ProtocolError> {
    E::try_from(value).map_err(|value| ProtocolError::UnexpectedValue { command_id, value })
}

/// Product identification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product_name: String,
    pub hardware_version: u32,
    pub firmware_version: FirmwareVersion,
    pub serial_number: String,
}

/// One distance measurement. Only the fields enabled in the
/// [`DistanceConfig`] used to decode it are present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceData {
    pub first_return_raw_mm: Option<i32>,
    pub first_return_filtered_mm: Option<i32>,
    pub first_return_strength: Option<i32>,
    pub last_return_raw_mm: Option<i32>,
    pub last_return_filtered_mm: Option<i32>,
    pub last_return_strength: Option<i32>,
    /// Hundredths of a degree Celsius
    pub temperature: Option<i32>,
    pub alarm_status: Option<i32>,
}

impl DistanceData {
    /// Decode a distance data frame produced with `config` active.
    ///
    /// Fields are packed in bit order with no gaps, one `i32` each.
    pub fn from_response(response: &Response, config: DistanceConfig) -> Result<Self, ProtocolError> {
        response.expect_command(commands::DISTANCE_DATA)?;

        let mut data = DistanceData::default();
        let mut offset = 0;
        let mut next = |flag: DistanceConfig, scale: i32| -> Result<Option<i32>, ProtocolError> {
            if !config.contains(flag) {
                return Ok(None);
            }
            let value = response.read_i32(offset)?;
            offset += 4;
            Ok(Some(value.saturating_mul(scale)))
        };

        data.first_return_raw_mm = next(DistanceConfig::FIRST_RETURN_RAW, 100)?;
        data.first_return_filtered_mm = next(DistanceConfig::FIRST_RETURN_FILTERED, 100)?;
        data.first_return_strength = next(DistanceConfig::FIRST_RETURN_STRENGTH, 1)?;
        data.last_return_raw_mm = next(DistanceConfig::LAST_RETURN_RAW, 100)?;
        data.last_return_filtered_mm = next(DistanceConfig::LAST_RETURN_FILTERED, 100)?;
        data.last_return_strength = next(DistanceConfig::LAST_RETURN_STRENGTH, 1)?;
        data.temperature = next(DistanceConfig::TEMPERATURE, 1)?;
        data.alarm_status = next(DistanceConfig::ALARM_STATUS, 1)?;

        Ok(data)
    }
}

/// One return in a multi data frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSignal {
    pub distance_cm: i32,
    pub strength: i32,
}

/// Multiple returns from a single measurement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiData {
    pub signals: [MultiSignal; MULTI_SIGNAL_COUNT],
    /// Hundredths of a degree Celsius
    pub temperature: i32,
}

impl MultiData {
    /// Decode a multi data frame
    pub fn from_response(response: &Response) -> Result<Self, ProtocolError> {
        response.expect_command(commands::MULTI_DATA)?;

        let mut data = MultiData::default();
        let mut offset = 0;
        for signal in data.signals.iter_mut() {
            signal.distance_cm = response.read_i32(offset)? / 10;
            signal.strength = response.read_i32(offset + 4)?;
            offset += 8;
        }
        data.temperature = response.read_i32(offset)?;

        Ok(data)
    }
}

/// Alarm states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmStatus {
    pub alarm_a: u8,
    pub alarm_b: u8,
}

impl AlarmStatus {
    /// Split the packed status word
    pub fn from_u32(status: u32) -> Self {
        Self {
            alarm_a: status as u8,
            alarm_b: (status >> 8) as u8,
        }
    }

    /// Whether alarm A is active
    pub fn alarm_a_active(&self) -> bool {
        self.alarm_a != 0
    }

    /// Whether alarm B is active
    pub fn alarm_b_active(&self) -> bool {
        self.alarm_b != 0
    }
}
