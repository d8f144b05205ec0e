//! Peripheral identifier helpers shared by the scanner and the BLE transport.

use btleplug::platform::PeripheralId;

use stagg_types::DeviceAddress;

/// Address CoreBluetooth reports when it hides the real MAC.
const HIDDEN_ADDRESS: &str = "00:00:00:00:00:00";

/// Format a peripheral ID as a plain string.
///
/// On macOS this yields the CoreBluetooth UUID; elsewhere the stack's own
/// identifier.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Whether a peripheral with this address and ID is the kettle at `wanted`.
///
/// MAC addresses match ignoring case and separators. Peripheral IDs
/// (macOS UUIDs) match ignoring case and hyphens.
pub fn identifier_matches(wanted: &DeviceAddress, bt_address: &str, peripheral_id: &str) -> bool {
    let wanted = wanted.normalized();
    if wanted.is_empty() {
        return false;
    }

    let normalize = |s: &str| s.to_ascii_lowercase().replace([':', '-'], "");

    if bt_address != HIDDEN_ADDRESS && normalize(bt_address) == wanted {
        return true;
    }
    normalize(peripheral_id) == wanted
}
