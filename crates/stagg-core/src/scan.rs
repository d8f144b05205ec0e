//! Locating a kettle on the radio.
//!
//! The kettle only advertises while awake, so a lookup first checks the
//! peripherals the adapter already knows and then falls back to a few
//! short scans of increasing length.

use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use stagg_types::DeviceAddress;

use crate::error::{Error, Result};
use crate::util::{format_peripheral_id, identifier_matches};

/// How hard to look for a kettle that is not already known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Length of the first scan; later scans grow linearly.
    pub duration: Duration,
    /// Number of scans before giving up.
    pub attempts: u32,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(2),
            attempts: 3,
        }
    }
}

impl ScanOptions {
    /// Create scan options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only check peripherals the adapter already knows.
    pub fn known_only() -> Self {
        Self {
            attempts: 0,
            ..Self::default()
        }
    }

    /// Set the first scan duration.
    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the number of scans.
    #[must_use]
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters.into_iter().next().ok_or(Error::NoAdapter)
}

/// Find the peripheral for `address`, scanning if it is not already known.
///
/// Returns `Ok(None)` when the kettle did not show up in any scan.
pub async fn find_peripheral(
    adapter: &Adapter,
    address: &DeviceAddress,
    options: &ScanOptions,
) -> Result<Option<Peripheral>> {
    info!("Looking for kettle: {}", address);

    if let Some(peripheral) = find_known_peripheral(adapter, address).await? {
        info!("Found kettle in cache (no scan needed)");
        return Ok(Some(peripheral));
    }

    for attempt in 1..=options.attempts {
        let scan_duration = options.duration * attempt;
        info!(
            "Scan attempt {}/{} ({:?})...",
            attempt, options.attempts, scan_duration
        );

        adapter.start_scan(ScanFilter::default()).await?;
        sleep(scan_duration).await;
        adapter.stop_scan().await?;

        if let Some(peripheral) = find_known_peripheral(adapter, address).await? {
            info!("Found kettle on attempt {}", attempt);
            return Ok(Some(peripheral));
        }

        if attempt < options.attempts {
            warn!("Kettle not found, retrying...");
        }
    }

    warn!("Kettle {} not found", address);
    Ok(None)
}

/// Search the adapter's known peripherals for `address`.
pub async fn find_known_peripheral(
    adapter: &Adapter,
    address: &DeviceAddress,
) -> Result<Option<Peripheral>> {
    for peripheral in adapter.peripherals().await? {
        let peripheral_id = format_peripheral_id(&peripheral.id());
        let bt_address = match peripheral.properties().await {
            Ok(Some(props)) => props.address.to_string(),
            _ => String::new(),
        };

        if identifier_matches(address, &bt_address, &peripheral_id) {
            debug!("Matched {} ({})", bt_address, peripheral_id);
            return Ok(Some(peripheral));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_options_default() {
        let options = ScanOptions::default();
        assert_eq!(options.duration, Duration::from_secs(2));
        assert_eq!(options.attempts, 3);
    }

    #[test]
    fn test_scan_options_builder() {
        let options = ScanOptions::new()
            .duration(Duration::from_secs(5))
            .attempts(1);
        assert_eq!(options.duration, Duration::from_secs(5));
        assert_eq!(options.attempts, 1);
        assert_eq!(ScanOptions::known_only().attempts, 0);
    }
}
