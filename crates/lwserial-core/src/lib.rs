//! # lwserial Core Library
//!
//! Serial protocol SDK for LightWare GRF-250 rangefinders.

#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Frame encoding with the LightWare CRC16
//! - A streaming frame parser that resynchronises on corrupt input
//! - A managed request/response engine with retries and timeouts
//! - Serial and in-memory transports
//! - The GRF-250 command set
//!
//! ## Example
//!
//! ```rust,ignore
//! use lwserial_core::prelude::*;
//!
//! let config = ConnectionConfig::for_port("/dev/ttyACM0");
//! let mut sensor = Grf250::open(&config)?;
//! sensor.initiate_serial()?;
//!
//! let info = sensor.product_info()?;
//! println!("{} firmware {}", info.product_name, info.firmware_version);
//!
//! let config = DistanceConfig::FIRST_RETURN_RAW | DistanceConfig::TEMPERATURE;
//! sensor.set_distance_config(config)?;
//! let data = sensor.distance_data(config)?;
//! println!("{:?} mm", data.first_return_raw_mm);
//! ```

pub mod config;
pub mod grf250;
pub mod protocol;
pub mod transport;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ConfigError, ConnectionConfig};
    pub use crate::grf250::{
        DistanceConfig, DistanceData, Enable, Grf250, MultiData, ProductInfo, Stream,
    };
    pub use crate::protocol::{
        CommandFilter, Connection, FirmwareVersion, ProtocolError, Request, Response, WaitStatus,
    };
    pub use crate::transport::{MockTransport, SerialTransport, Transport, TransportError};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
