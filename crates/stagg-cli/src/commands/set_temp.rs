//! Target temperature command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use stagg_types::TemperatureUnit;

use crate::cli::{DeviceArgs, OutputFormat, UnitArgs};
use crate::config::Config;
use crate::format::FormatOptions;
use crate::style;
use crate::util::{open_kettle, resolve_target};

use super::report_after_command;

pub async fn cmd_set_temp(
    device: &DeviceArgs,
    config: &Config,
    value: i32,
    unit: UnitArgs,
    format: OutputFormat,
    output: Option<&PathBuf>,
    opts: &FormatOptions,
) -> Result<()> {
    let unit = unit.resolve(config.temperature_unit.unwrap_or_default());
    if let Some(note) = clamp_note(value, unit) {
        eprintln!("{}", style::format_warning(&note, opts.no_color));
    }

    let (address, kettle_config) = resolve_target(device, config)?;
    let kettle = open_kettle(address, kettle_config).await?;

    if let Err(e) = kettle.set_temperature(value, unit).await {
        kettle.disconnect().await.ok();
        return Err(e).context("Failed to send target temperature");
    }

    let message = format!("Target set to {}{}", unit.clamp(value), unit.symbol());
    report_after_command(&kettle, &message, format, output, opts).await
}

/// Describe the adjustment when `value` falls outside the kettle's range.
fn clamp_note(value: i32, unit: TemperatureUnit) -> Option<String> {
    let clamped = unit.clamp(value);
    if i32::from(clamped) == value {
        return None;
    }
    let (min, max) = unit.range();
    Some(format!(
        "{}{} is outside {}-{}{}, using {}{}",
        value,
        unit.symbol(),
        min,
        max,
        unit.symbol(),
        clamped,
        unit.symbol()
    ))
}
