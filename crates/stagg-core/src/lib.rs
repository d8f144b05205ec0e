//! Core BLE library for Fellow Stagg electric kettles.
//!
//! This crate talks to Stagg EKG+ and EKG Pro kettles over Bluetooth Low
//! Energy: it authenticates, sends power and target-temperature commands,
//! and decodes the kettle's notification stream into a [`DeviceState`].
//!
//! # Features
//!
//! - **Frame codec**: command frames with rolling sequence and checksum
//! - **Sessions**: connect with backoff, handshake, write debouncing, liveness checks
//! - **Graceful polling**: last known state returned when a poll fails
//! - **Registry**: one shared [`Kettle`] per address via [`KettleManager`]
//! - **Testing**: an in-memory [`MockTransport`]
//!
//! # Platform Differences
//!
//! Kettles are addressed by their Bluetooth MAC address on Linux and
//! Windows (e.g. `AA:BB:CC:DD:EE:FF`) and by the UUID CoreBluetooth assigns
//! on macOS. The macOS UUID is stable per host but differs between Macs.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use stagg_core::{BleTransport, Kettle};
//! use stagg_types::{DeviceAddress, TemperatureUnit};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(BleTransport::new().await?);
//!     let kettle = Kettle::new(transport, DeviceAddress::new("AA:BB:CC:DD:EE:FF")?);
//!
//!     kettle.set_temperature(205, TemperatureUnit::Fahrenheit).await?;
//!     kettle.set_power(true).await?;
//!
//!     let state = kettle.refresh_after_settle().await?;
//!     println!("{}", state);
//!
//!     kettle.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod ble;
pub mod codec;
pub mod error;
pub mod kettle;
pub mod manager;
pub mod mock;
pub mod scan;
pub mod session;
pub mod traits;
pub mod util;

// Core exports
pub use backoff::BackoffPolicy;
pub use ble::{BleLink, BleTransport};
pub use error::{Error, Result};
pub use kettle::{Kettle, KettleConfig, PowerFraming};
pub use manager::KettleManager;
pub use mock::{MockLink, MockPeripheral, MockTransport};
pub use scan::ScanOptions;
pub use session::{SessionConfig, SessionManager, SessionState};
pub use traits::{KettleTransport, NotificationHandler, TransportLink};
pub use util::format_peripheral_id;

/// A kettle backed by the host Bluetooth stack.
pub type BleKettle = Kettle<BleTransport>;

// Re-export from stagg-types
pub use stagg_types::uuid as uuids;
pub use stagg_types::{Command, CommandKind, DeviceAddress, DeviceState, TemperatureUnit};
