//! GRF-250 command ids

pub const PRODUCT_NAME: u8 = 0;
pub const HARDWARE_VERSION: u8 = 1;
pub const FIRMWARE_VERSION: u8 = 2;
pub const SERIAL_NUMBER: u8 = 3;
pub const USER_DATA: u8 = 9;
pub const TOKEN: u8 = 10;
pub const SAVE_PARAMETERS: u8 = 12;
pub const RESET: u8 = 14;
pub const DISTANCE_CONFIG: u8 = 27;
pub const STREAM: u8 = 30;
pub const DISTANCE_DATA: u8 = 44;
pub const MULTI_DATA: u8 = 45;
pub const LASER_FIRING: u8 = 50;
pub const TEMPERATURE: u8 = 55;
pub const AUTO_EXPOSURE: u8 = 70;
pub const UPDATE_RATE: u8 = 74;
pub const ALARM_STATUS: u8 = 76;
pub const ALARM_RETURN_MODE: u8 = 77;
pub const LOST_SIGNAL_COUNTER: u8 = 78;
pub const ALARM_A_DISTANCE: u8 = 79;
pub const ALARM_B_DISTANCE: u8 = 80;
pub const ALARM_HYSTERESIS: u8 = 81;
pub const GPIO_MODE: u8 = 83;
pub const GPIO_ALARM_CONFIRM_COUNT: u8 = 84;
pub const MEDIAN_FILTER_ENABLE: u8 = 86;
pub const MEDIAN_FILTER_SIZE: u8 = 87;
pub const SMOOTH_FILTER_ENABLE: u8 = 88;
pub const SMOOTH_FILTER_FACTOR: u8 = 89;
pub const BAUD_RATE: u8 = 91;
pub const I2C_ADDRESS: u8 = 92;
pub const ROLLING_AVERAGE_ENABLE: u8 = 93;
pub const ROLLING_AVERAGE_SIZE: u8 = 94;
pub const SLEEP: u8 = 98;
pub const LED_STATE: u8 = 110;
pub const ZERO_OFFSET: u8 = 114;
