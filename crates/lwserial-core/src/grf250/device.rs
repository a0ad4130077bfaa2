//! Managed GRF-250 commands
//!
//! Every getter sends a read request and decodes the matching response;
//! every setter validates its argument before anything is sent.

use std::fmt;

use tracing::info;

use super::commands;
use super::types::{
    decode, AlarmStatus, BaudRate, DistanceConfig, DistanceData, Enable, GpioMode, MultiData,
    ProductInfo, ReturnMode, Stream, USER_DATA_SIZE,
};
use crate::config::ConnectionConfig;
use crate::protocol::{Connection, FirmwareVersion, ProtocolError, Response, WaitStatus};
use crate::transport::{SerialTransport, Transport};

/// Bytes that switch a sensor from its default interface to serial mode
const SERIAL_MODE_WAKE: &[u8] = b"UUU";

/// Magic value of the sleep command
const SLEEP_KEY: u8 = 123;

/// A GRF-250 rangefinder on a managed connection
pub struct Grf250<T: Transport> {
    connection: Connection<T>,
}

impl Grf250<SerialTransport> {
    /// Open the serial port described by `config`
    pub fn open(config: &ConnectionConfig) -> Result<Self, ProtocolError> {
        let connection = Connection::open(config)?;
        info!("opened GRF-250 on {}", config.port_name);
        Ok(Self::new(connection))
    }
}

impl<T: Transport> Grf250<T> {
    /// Create a new device on an existing connection
    pub fn new(connection: Connection<T>) -> Self {
        Self { connection }
    }

    /// The underlying connection
    pub fn connection(&self) -> &Connection<T> {
        &self.connection
    }

    /// The underlying connection, mutably
    pub fn connection_mut(&mut self) -> &mut Connection<T> {
        &mut self.connection
    }

    /// Release the connection
    pub fn into_connection(self) -> Connection<T> {
        self.connection
    }

    fn read(&mut self, command_id: u8) -> Result<&Response, ProtocolError> {
        let response = self.connection.execute(|request| {
            request.set_read(command_id);
            Ok(())
        })?;
        response.expect_command(command_id)?;
        Ok(response)
    }

    fn read_u8(&mut self, command_id: u8) -> Result<u8, ProtocolError> {
        self.read(command_id)?.read_u8(0)
    }

    fn read_u32(&mut self, command_id: u8) -> Result<u32, ProtocolError> {
        self.read(command_id)?.read_u32(0)
    }

    fn read_i32(&mut self, command_id: u8) -> Result<i32, ProtocolError> {
        self.read(command_id)?.read_i32(0)
    }

    fn read_string(&mut self, command_id: u8) -> Result<String, ProtocolError> {
        self.read(command_id)?.read_string(0)
    }

    fn write_u8(&mut self, command_id: u8, value: u8) -> Result<(), ProtocolError> {
        self.connection.execute(|request| {
            request.set_write_u8(command_id, value);
            Ok(())
        })?;
        Ok(())
    }

    fn write_u16(&mut self, command_id: u8, value: u16) -> Result<(), ProtocolError> {
        self.connection.execute(|request| {
            request.set_write_u16(command_id, value);
            Ok(())
        })?;
        Ok(())
    }

    fn write_u32(&mut self, command_id: u8, value: u32) -> Result<(), ProtocolError> {
        self.connection.execute(|request| {
            request.set_write_u32(command_id, value);
            Ok(())
        })?;
        Ok(())
    }

    fn write_i32(&mut self, command_id: u8, value: i32) -> Result<(), ProtocolError> {
        self.connection.execute(|request| {
            request.set_write_i32(command_id, value);
            Ok(())
        })?;
        Ok(())
    }

    fn read_enum<E: TryFrom<u32, Error = u32>>(&mut self, command_id: u8) -> Result<E, ProtocolError> {
        let value = self.read_u8(command_id)?;
        decode(command_id, value as u32)
    }

    fn write_enum<E: Into<u32>>(&mut self, command_id: u8, value: E) -> Result<(), ProtocolError> {
        let value: u32 = value.into();
        self.write_u8(command_id, value as u8)
    }

    // ------------------------------------------------------------------
    // Identification
    // ------------------------------------------------------------------

    /// Switch the sensor to serial mode. Sent raw, no response is expected.
    pub fn initiate_serial(&mut self) -> Result<(), ProtocolError> {
        self.connection.send_raw(SERIAL_MODE_WAKE)
    }

    /// 16-character product name
    pub fn product_name(&mut self) -> Result<String, ProtocolError> {
        self.read_string(commands::PRODUCT_NAME)
    }

    pub fn hardware_version(&mut self) -> Result<u32, ProtocolError> {
        self.read_u32(commands::HARDWARE_VERSION)
    }

    pub fn firmware_version(&mut self) -> Result<FirmwareVersion, ProtocolError> {
        self.read_u32(commands::FIRMWARE_VERSION)
            .map(FirmwareVersion::from_u32)
    }

    /// Serial identifier assigned during production
    pub fn serial_number(&mut self) -> Result<String, ProtocolError> {
        self.read_string(commands::SERIAL_NUMBER)
    }

    /// Read name, versions and serial number in turn
    pub fn product_info(&mut self) -> Result<ProductInfo, ProtocolError> {
        Ok(ProductInfo {
            product_name: self.product_name()?,
            hardware_version: self.hardware_version()?,
            firmware_version: self.firmware_version()?,
            serial_number: self.serial_number()?,
        })
    }

    /// 16 bytes of free-form storage
    pub fn user_data(&mut self) -> Result<[u8; USER_DATA_SIZE], ProtocolError> {
        let response = self.read(commands::USER_DATA)?;
        let mut data = [0u8; USER_DATA_SIZE];
        data.copy_from_slice(response.read_bytes(0, USER_DATA_SIZE)?);
        Ok(data)
    }

    /// Store exactly 16 bytes of user data
    pub fn set_user_data(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        if data.len() != USER_DATA_SIZE {
            return Err(ProtocolError::InvalidParameter(format!(
                "user data must be {} bytes, got {}",
                USER_DATA_SIZE,
                data.len()
            )));
        }
        self.connection
            .execute(|request| request.set_write_data(commands::USER_DATA, data))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Token required by save and reset
    pub fn token(&mut self) -> Result<u16, ProtocolError> {
        self.read(commands::TOKEN)?.read_u16(0)
    }

    /// Persist the current settings
    pub fn save_parameters(&mut self) -> Result<(), ProtocolError> {
        let token = self.token()?;
        self.write_u16(commands::SAVE_PARAMETERS, token)
    }

    /// Restart the sensor
    pub fn reset(&mut self) -> Result<(), ProtocolError> {
        let token = self.token()?;
        self.write_u16(commands::RESET, token)
    }

    /// Put the sensor to sleep until the next byte arrives
    pub fn sleep(&mut self) -> Result<(), ProtocolError> {
        self.write_u8(commands::SLEEP, SLEEP_KEY)
    }

    // ------------------------------------------------------------------
    // Measurement
    // ------------------------------------------------------------------

    pub fn distance_config(&mut self) -> Result<DistanceConfig, ProtocolError> {
        self.read_u32(commands::DISTANCE_CONFIG)
            .map(DistanceConfig::from_bits_retain)
    }

    /// Select the fields reported in distance data
    pub fn set_distance_config(&mut self, config: DistanceConfig) -> Result<(), ProtocolError> {
        self.write_u32(commands::DISTANCE_CONFIG, config.bits())
    }

    pub fn stream(&mut self) -> Result<Stream, ProtocolError> {
        let value = self.read_u32(commands::STREAM)?;
        decode(commands::STREAM, value)
    }

    /// Choose what the sensor pushes on its own
    pub fn set_stream(&mut self, stream: Stream) -> Result<(), ProtocolError> {
        self.write_u32(commands::STREAM, stream.into())
    }

    /// Request one distance measurement. `config` must match the sensor's
    /// current distance config.
    pub fn distance_data(&mut self, config: DistanceConfig) -> Result<DistanceData, ProtocolError> {
        let response = self.read(commands::DISTANCE_DATA)?;
        DistanceData::from_response(response, config)
    }

    /// Request one multi-return measurement
    pub fn multi_data(&mut self) -> Result<MultiData, ProtocolError> {
        let response = self.read(commands::MULTI_DATA)?;
        MultiData::from_response(response)
    }

    /// Poll for a streamed distance frame.
    ///
    /// With `timeout_ms == 0` this returns `Ok(None)` when no frame is ready.
    pub fn wait_for_streamed_distance(
        &mut self,
        config: DistanceConfig,
        timeout_ms: u32,
    ) -> Result<Option<DistanceData>, ProtocolError> {
        match self
            .connection
            .wait_for_response(commands::DISTANCE_DATA, timeout_ms)?
        {
            WaitStatus::Ready => {
                DistanceData::from_response(self.connection.response(), config).map(Some)
            }
            WaitStatus::Again => Ok(None),
        }
    }

    /// Poll for a streamed multi data frame
    pub fn wait_for_streamed_multi_data(
        &mut self,
        timeout_ms: u32,
    ) -> Result<Option<MultiData>, ProtocolError> {
        match self
            .connection
            .wait_for_response(commands::MULTI_DATA, timeout_ms)?
        {
            WaitStatus::Ready => MultiData::from_response(self.connection.response()).map(Some),
            WaitStatus::Again => Ok(None),
        }
    }

    pub fn laser_firing(&mut self) -> Result<Enable, ProtocolError> {
        self.read_enum(commands::LASER_FIRING)
    }

    pub fn set_laser_firing(&mut self, enable: Enable) -> Result<(), ProtocolError> {
        self.write_enum(commands::LASER_FIRING, enable)
    }

    /// Internal temperature in hundredths of a degree Celsius
    pub fn temperature(&mut self) -> Result<i32, ProtocolError> {
        self.read_i32(commands::TEMPERATURE)
    }

    pub fn auto_exposure(&mut self) -> Result<Enable, ProtocolError> {
        self.read_enum(commands::AUTO_EXPOSURE)
    }

    pub fn set_auto_exposure(&mut self, enable: Enable) -> Result<(), ProtocolError> {
        self.write_enum(commands::AUTO_EXPOSURE, enable)
    }

    /// Measurement rate in Hz
    pub fn update_rate(&mut self) -> Result<u32, ProtocolError> {
        self.read_u32(commands::UPDATE_RATE)
    }

    /// Set the measurement rate, 1 to 50 Hz
    pub fn set_update_rate(&mut self, rate_hz: u32) -> Result<(), ProtocolError> {
        check_range("update rate", rate_hz, 1, 50)?;
        self.write_u32(commands::UPDATE_RATE, rate_hz)
    }

    pub fn zero_offset_cm(&mut self) -> Result<i32, ProtocolError> {
        self.read_i32(commands::ZERO_OFFSET)
            .map(|offset| offset.saturating_mul(10))
    }

    /// Set the zero offset, -1000 to 1000 cm. Applied in 10 cm steps.
    pub fn set_zero_offset_cm(&mut self, offset_cm: i32) -> Result<(), ProtocolError> {
        check_range("zero offset", offset_cm, -1000, 1000)?;
        self.write_i32(commands::ZERO_OFFSET, offset_cm / 10)
    }

    // ------------------------------------------------------------------
    // Alarms
    // ------------------------------------------------------------------

    pub fn alarm_status(&mut self) -> Result<AlarmStatus, ProtocolError> {
        self.read_u32(commands::ALARM_STATUS)
            .map(AlarmStatus::from_u32)
    }

    pub fn alarm_return_mode(&mut self) -> Result<ReturnMode, ProtocolError> {
        self.read_enum(commands::ALARM_RETURN_MODE)
    }

    pub fn set_alarm_return_mode(&mut self, mode: ReturnMode) -> Result<(), ProtocolError> {
        self.write_enum(commands::ALARM_RETURN_MODE, mode)
    }

    pub fn lost_signal_counter(&mut self) -> Result<u32, ProtocolError> {
        self.read_u32(commands::LOST_SIGNAL_COUNTER)
    }

    /// Set how many missed readings count as a lost signal, 1 to 250
    pub fn set_lost_signal_counter(&mut self, count: u32) -> Result<(), ProtocolError> {
        check_range("lost signal counter", count, 1, 250)?;
        self.write_u32(commands::LOST_SIGNAL_COUNTER, count)
    }

    pub fn alarm_a_distance_cm(&mut self) -> Result<u32, ProtocolError> {
        self.read_decimetres(commands::ALARM_A_DISTANCE)
    }

    /// Set the alarm A trigger distance, up to 30000 cm
    pub fn set_alarm_a_distance_cm(&mut self, distance_cm: u32) -> Result<(), ProtocolError> {
        check_range("alarm A distance", distance_cm, 0, 30000)?;
        self.write_u32(commands::ALARM_A_DISTANCE, distance_cm / 10)
    }

    pub fn alarm_b_distance_cm(&mut self) -> Result<u32, ProtocolError> {
        self.read_decimetres(commands::ALARM_B_DISTANCE)
    }

    /// Set the alarm B trigger distance, up to 30000 cm
    pub fn set_alarm_b_distance_cm(&mut self, distance_cm: u32) -> Result<(), ProtocolError> {
        check_range("alarm B distance", distance_cm, 0, 30000)?;
        self.write_u32(commands::ALARM_B_DISTANCE, distance_cm / 10)
    }

    pub fn alarm_hysteresis_cm(&mut self) -> Result<u32, ProtocolError> {
        self.read_decimetres(commands::ALARM_HYSTERESIS)
    }

    /// Set the alarm hysteresis, up to 3000 cm
    pub fn set_alarm_hysteresis_cm(&mut self, hysteresis_cm: u32) -> Result<(), ProtocolError> {
        check_range("alarm hysteresis", hysteresis_cm, 0, 3000)?;
        self.write_u32(commands::ALARM_HYSTERESIS, hysteresis_cm / 10)
    }

    fn read_decimetres(&mut self, command_id: u8) -> Result<u32, ProtocolError> {
        self.read_u32(command_id).map(|dm| dm.saturating_mul(10))
    }

    pub fn gpio_mode(&mut self) -> Result<GpioMode, ProtocolError> {
        self.read_enum(commands::GPIO_MODE)
    }

    pub fn set_gpio_mode(&mut self, mode: GpioMode) -> Result<(), ProtocolError> {
        self.write_enum(commands::GPIO_MODE, mode)
    }

    pub fn gpio_alarm_confirm_count(&mut self) -> Result<u32, ProtocolError> {
        self.read_u32(commands::GPIO_ALARM_CONFIRM_COUNT)
    }

    /// Set how many consecutive readings confirm an alarm, up to 1000
    pub fn set_gpio_alarm_confirm_count(&mut self, count: u32) -> Result<(), ProtocolError> {
        check_range("GPIO alarm confirm count", count, 0, 1000)?;
        self.write_u32(commands::GPIO_ALARM_CONFIRM_COUNT, count)
    }

    // ------------------------------------------------------------------
    // Filtering
    // ------------------------------------------------------------------

    pub fn median_filter_enable(&mut self) -> Result<Enable, ProtocolError> {
        self.read_enum(commands::MEDIAN_FILTER_ENABLE)
    }

    pub fn set_median_filter_enable(&mut self, enable: Enable) -> Result<(), ProtocolError> {
        self.write_enum(commands::MEDIAN_FILTER_ENABLE, enable)
    }

    pub fn median_filter_size(&mut self) -> Result<u32, ProtocolError> {
        self.read_u32(commands::MEDIAN_FILTER_SIZE)
    }

    /// Set the median window, 3 to 32 samples
    pub fn set_median_filter_size(&mut self, size: u32) -> Result<(), ProtocolError> {
        check_range("median filter size", size, 3, 32)?;
        self.write_u32(commands::MEDIAN_FILTER_SIZE, size)
    }

    pub fn smooth_filter_enable(&mut self) -> Result<Enable, ProtocolError> {
        self.read_enum(commands::SMOOTH_FILTER_ENABLE)
    }

    pub fn set_smooth_filter_enable(&mut self, enable: Enable) -> Result<(), ProtocolError> {
        self.write_enum(commands::SMOOTH_FILTER_ENABLE, enable)
    }

    pub fn smooth_filter_factor(&mut self) -> Result<u32, ProtocolError> {
        self.read_u32(commands::SMOOTH_FILTER_FACTOR)
    }

    /// Set the smoothing factor, 1 to 99
    pub fn set_smooth_filter_factor(&mut self, factor: u32) -> Result<(), ProtocolError> {
        check_range("smooth filter factor", factor, 1, 99)?;
        self.write_u32(commands::SMOOTH_FILTER_FACTOR, factor)
    }

    pub fn rolling_average_enable(&mut self) -> Result<Enable, ProtocolError> {
        self.read_enum(commands::ROLLING_AVERAGE_ENABLE)
    }

    pub fn set_rolling_average_enable(&mut self, enable: Enable) -> Result<(), ProtocolError> {
        self.write_enum(commands::ROLLING_AVERAGE_ENABLE, enable)
    }

    pub fn rolling_average_size(&mut self) -> Result<u32, ProtocolError> {
        self.read_u32(commands::ROLLING_AVERAGE_SIZE)
    }

    /// Set the rolling average window, 2 to 32 samples
    pub fn set_rolling_average_size(&mut self, size: u32) -> Result<(), ProtocolError> {
        check_range("rolling average size", size, 2, 32)?;
        self.write_u32(commands::ROLLING_AVERAGE_SIZE, size)
    }

    // ------------------------------------------------------------------
    // Interface
    // ------------------------------------------------------------------

    pub fn baud_rate(&mut self) -> Result<BaudRate, ProtocolError> {
        self.read_enum(commands::BAUD_RATE)
    }

    /// Change the serial speed. Takes effect after a save and reset.
    pub fn set_baud_rate(&mut self, baud_rate: BaudRate) -> Result<(), ProtocolError> {
        self.write_enum(commands::BAUD_RATE, baud_rate)
    }

    pub fn i2c_address(&mut self) -> Result<u8, ProtocolError> {
        self.read_u8(commands::I2C_ADDRESS)
    }

    pub fn set_i2c_address(&mut self, address: u8) -> Result<(), ProtocolError> {
        self.write_u8(commands::I2C_ADDRESS, address)
    }

    pub fn led_state(&mut self) -> Result<Enable, ProtocolError> {
        self.read_enum(commands::LED_STATE)
    }

    pub fn set_led_state(&mut self, enable: Enable) -> Result<(), ProtocolError> {
        self.write_enum(commands::LED_STATE, enable)
    }
}

fn check_range<V>(name: &str, value: V, min: V, max: V) -> Result<(), ProtocolError>
where
    V: PartialOrd + fmt::Display,
{
    if value < min || value > max {
        return Err(ProtocolError::InvalidParameter(format!(
            "{} {} out of range {}..={}",
            name, value, min, max
        )));
    }
    Ok(())
}
