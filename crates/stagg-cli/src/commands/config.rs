//! Config command implementation.

use std::path::Path;

use anyhow::{Context, Result, bail};
use stagg_types::DeviceAddress;

use crate::cli::ConfigAction;
use crate::config::Config;

pub fn cmd_config(action: ConfigAction, quiet: bool) -> Result<()> {
    let path = Config::path();
    if let Some(message) = apply(action, &path)? {
        if !quiet {
            println!("{}", message);
        }
    }
    Ok(())
}

/// Run one config action against the file at `path`.
///
/// Returns the text to print, if any.
fn apply(action: ConfigAction, path: &Path) -> Result<Option<String>> {
    match action {
        ConfigAction::Path => Ok(Some(path.display().to_string())),
        ConfigAction::Show => {
            let config = Config::load_from(path);
            let content = toml::to_string_pretty(&config).context("Failed to serialize config")?;
            if content.trim().is_empty() {
                Ok(Some(format!("# {} (defaults)", path.display())))
            } else {
                Ok(Some(format!("# {}\n{}", path.display(), content.trim_end())))
            }
        }
        ConfigAction::SetDevice { address } => {
            let address = DeviceAddress::new(address).context("Invalid kettle address")?;
            let mut config = Config::load_from(path);
            config.device = Some(address.as_str().to_string());
            config.save_to(path)?;
            Ok(Some(format!("Default kettle set to {}", address)))
        }
        ConfigAction::Alias { name, address } => {
            let address = DeviceAddress::new(address).context("Invalid kettle address")?;
            let mut config = Config::load_from(path);
            config
                .aliases
                .insert(name.clone(), address.as_str().to_string());
            config.save_to(path)?;
            Ok(Some(format!("Alias '{}' -> {}", name, address)))
        }
        ConfigAction::Unalias { name } => {
            let mut config = Config::load_from(path);
            if config.aliases.remove(&name).is_none() {
                bail!("No alias named '{}'", name);
            }
            config.save_to(path)?;
            Ok(Some(format!("Removed alias '{}'", name)))
        }
    }
}
