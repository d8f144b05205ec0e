//! Platform-agnostic types for Fellow Stagg BLE kettles.
//!
//! This crate provides the value types shared by the BLE core
//! (stagg-core) and front-ends such as the `stagg` CLI.
//!
//! # Features
//!
//! - Command values and temperature clamping rules
//! - The decoded [`DeviceState`] snapshot
//! - UUID constants for the kettle's GATT service
//! - Error types for value parsing
//!
//! # Example
//!
//! ```
//! use stagg_types::{Command, CommandKind, TemperatureUnit};
//!
//! let cmd = Command::target_temperature(400, TemperatureUnit::Fahrenheit);
//! assert_eq!(cmd.kind, CommandKind::TargetTemperature);
//! assert_eq!(cmd.value, 212);
//! ```

pub mod error;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use types::{
    Command, CommandKind, DeviceAddress, DeviceState, MAX_TEMP_C, MAX_TEMP_F, MIN_TEMP_C,
    MIN_TEMP_F, TemperatureUnit,
};
pub use uuid as uuids;
