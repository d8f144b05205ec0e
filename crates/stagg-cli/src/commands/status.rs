//! Status command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use stagg_core::{Kettle, KettleTransport};
use stagg_types::DeviceState;

use crate::cli::{DeviceArgs, OutputFormat};
use crate::config::Config;
use crate::format::{FormatOptions, format_state_json, format_state_text};
use crate::util::{open_kettle, resolve_target, write_output};

pub async fn cmd_status(
    device: &DeviceArgs,
    config: &Config,
    format: OutputFormat,
    output: Option<&PathBuf>,
    opts: &FormatOptions,
) -> Result<()> {
    let (address, kettle_config) = resolve_target(device, config)?;
    let kettle = open_kettle(address, kettle_config).await?;

    let state = read_once(&kettle).await?;
    let label = kettle.address().as_str();
    let content = match format {
        OutputFormat::Json => format_state_json(label, &state)?,
        OutputFormat::Text => format_state_text(label, &state, opts),
    };

    write_output(output, &content)?;
    Ok(())
}

/// Poll once and always release the link afterwards.
async fn read_once<T: KettleTransport>(kettle: &Kettle<T>) -> Result<DeviceState> {
    let state = kettle.poll().await;
    if let Err(e) = kettle.disconnect().await {
        tracing::warn!("Disconnect failed: {}", e);
    }
    state.context("Failed to read kettle state")
}
