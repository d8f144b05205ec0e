//! Command implementations for the CLI.

mod config;
mod power;
mod set_temp;
mod status;
mod watch;

pub use config::cmd_config;
pub use power::cmd_power;
pub use set_temp::cmd_set_temp;
pub use status::cmd_status;
pub use watch::{WatchArgs, cmd_watch};

use std::path::PathBuf;

use anyhow::Result;
use stagg_core::{Kettle, KettleTransport};
use tracing::warn;

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_state_json, format_state_text};
use crate::style;
use crate::util::write_output;

/// Let a command land, re-poll, and print the refreshed state.
///
/// The command already succeeded at this point, so a failed refresh is
/// reported as a warning rather than an error.
async fn report_after_command<T: KettleTransport>(
    kettle: &Kettle<T>,
    message: &str,
    format: OutputFormat,
    output: Option<&PathBuf>,
    opts: &FormatOptions,
) -> Result<()> {
    let refreshed = kettle.refresh_after_settle().await;
    if let Err(e) = kettle.disconnect().await {
        warn!("Disconnect failed: {}", e);
    }

    let label = kettle.address().as_str();
    match (refreshed, format) {
        (Ok(state), OutputFormat::Json) => write_output(output, &format_state_json(label, &state)?),
        (Ok(state), OutputFormat::Text) => {
            eprintln!("{}", style::format_success(message, opts.no_color));
            write_output(output, &format_state_text(label, &state, opts))
        }
        (Err(e), _) => {
            eprintln!("{}", style::format_success(message, opts.no_color));
            eprintln!(
                "{}",
                style::format_warning(&format!("Could not read back state: {}", e), opts.no_color)
            );
            Ok(())
        }
    }
}
