//! Power command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::cli::{DeviceArgs, OutputFormat, PowerState};
use crate::config::Config;
use crate::format::FormatOptions;
use crate::util::{open_kettle, resolve_target};

use super::report_after_command;

pub async fn cmd_power(
    device: &DeviceArgs,
    config: &Config,
    state: PowerState,
    format: OutputFormat,
    output: Option<&PathBuf>,
    opts: &FormatOptions,
) -> Result<()> {
    let (address, kettle_config) = resolve_target(device, config)?;
    let kettle = open_kettle(address, kettle_config).await?;

    let on = state.is_on();
    if let Err(e) = kettle.set_power(on).await {
        kettle.disconnect().await.ok();
        return Err(e).context("Failed to send power command");
    }

    let message = format!("Heater switched {}", if on { "on" } else { "off" });
    report_after_command(&kettle, &message, format, output, opts).await
}
