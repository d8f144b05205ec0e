//! Bluetooth UUIDs for Stagg kettles.
//!
//! The kettle exposes a single "serial port" style characteristic that is
//! used for the authentication handshake, outbound command frames and
//! inbound state notifications.

use uuid::{Uuid, uuid};

/// Kettle serial service (16-bit `0x1820`).
pub const KETTLE_SERVICE: Uuid = uuid!("00001820-0000-1000-8000-00805f9b34fb");

/// Kettle command/notification characteristic (16-bit `0x2A80`).
pub const KETTLE_CHARACTERISTIC: Uuid = uuid!("00002a80-0000-1000-8000-00805f9b34fb");

/// Vendor service advertised by EKG Pro firmware.
pub const PRO_VENDOR_SERVICE: Uuid = uuid!("021a9004-0302-4aea-bff4-6b3f1c5adfb4");
