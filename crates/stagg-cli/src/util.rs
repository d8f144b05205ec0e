//! Utility functions for CLI operations.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use stagg_core::{BleKettle, BleTransport, Kettle, KettleConfig};
use stagg_types::DeviceAddress;

use crate::cli::DeviceArgs;
use crate::config::{Config, resolve_device, resolve_timeout};

/// Turn an optional identifier into an address, with a helpful error message.
pub fn require_device(device: Option<String>) -> Result<DeviceAddress> {
    let device = device.ok_or_else(|| {
        anyhow::anyhow!(
            "No kettle specified. Use --device <ADDRESS>, set STAGG_DEVICE, \
             or run 'stagg config set-device <ADDRESS>'."
        )
    })?;
    DeviceAddress::new(device).context("Invalid kettle address")
}

/// Resolve the target kettle and its configuration from flags and the config file.
pub fn resolve_target(args: &DeviceArgs, config: &Config) -> Result<(DeviceAddress, KettleConfig)> {
    let address = require_device(resolve_device(args.device.clone(), config))?;
    let timeout = resolve_timeout(args.timeout, config);
    let kettle_config = config.kettle_config(timeout, args.per_operation, args.legacy_power);
    Ok((address, kettle_config))
}

/// Open a kettle handle on the host Bluetooth adapter.
///
/// No connection is made until the first operation.
pub async fn open_kettle(address: DeviceAddress, config: KettleConfig) -> Result<BleKettle> {
    let transport = BleTransport::new()
        .await
        .context("Failed to open Bluetooth adapter")?;
    Kettle::with_config(Arc::new(transport), address, config)
        .context("Invalid kettle configuration")
}

/// Write output to file or stdout
pub fn write_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}

/// Append output to a file, or print it to stdout.
pub fn append_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            file.write_all(content.as_bytes())
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}
