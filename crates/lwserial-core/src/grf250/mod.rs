//! LightWare GRF-250 rangefinder
//!
//! Per-parameter commands built on the managed [`Connection`]. Distances
//! reported in distance data frames are scaled to millimetres; alarm and
//! offset settings are exchanged in centimetres and applied by the sensor in
//! 10 cm steps.
//!
//! [`Connection`]: crate::protocol::Connection

pub mod commands;
mod device;
mod types;

pub use device::Grf250;
pub use types::{
    AlarmStatus, BaudRate, DistanceConfig, DistanceData, Enable, GpioMode, MultiData,
    MultiSignal, ProductInfo, ReturnMode, Stream, MULTI_SIGNAL_COUNT, USER_DATA_SIZE,
};
