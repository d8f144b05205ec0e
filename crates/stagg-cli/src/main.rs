use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod format;
mod style;
mod util;

use cli::{Cli, Commands};
use commands::{WatchArgs, cmd_config, cmd_power, cmd_set_temp, cmd_status, cmd_watch};
use config::Config;
use format::FormatOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = Config::load();
    let opts = FormatOptions::new(cli.no_color);
    let output = cli.output.as_ref();

    match cli.command {
        Commands::Status { device, format } => {
            cmd_status(&device, &config, format, output, &opts).await?;
        }
        Commands::Power {
            device,
            state,
            format,
        } => {
            cmd_power(&device, &config, state, format, output, &opts).await?;
        }
        Commands::SetTemp {
            device,
            value,
            unit,
            format,
        } => {
            cmd_set_temp(&device, &config, value, unit, format, output, &opts).await?;
        }
        Commands::Watch {
            device,
            interval,
            count,
            format,
        } => {
            cmd_watch(
                WatchArgs {
                    device: &device,
                    interval,
                    count,
                    format,
                    output,
                    quiet: cli.quiet,
                    opts: &opts,
                },
                &config,
            )
            .await?;
        }
        Commands::Config { action } => {
            cmd_config(action, cli.quiet)?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "stagg", &mut io::stdout());
        }
    }

    Ok(())
}
