//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use stagg_types::TemperatureUnit;

#[derive(Parser)]
#[command(name = "stagg")]
#[command(author, version, about = "Control Fellow Stagg kettles over Bluetooth", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Write output to file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read the kettle state once
    Status {
        #[command(flatten)]
        device: DeviceArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Switch the heater on or off
    Power {
        #[command(flatten)]
        device: DeviceArgs,

        /// Desired heater state
        #[arg(value_enum)]
        state: PowerState,

        /// Output format for the refreshed state
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Set the target temperature
    SetTemp {
        #[command(flatten)]
        device: DeviceArgs,

        /// Target temperature; out-of-range values are clamped
        #[arg(allow_negative_numbers = true)]
        value: i32,

        #[command(flatten)]
        unit: UnitArgs,

        /// Output format for the refreshed state
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Poll the kettle on a fixed cadence until interrupted
    Watch {
        #[command(flatten)]
        device: DeviceArgs,

        /// Polling interval in seconds (default: from config, or 30)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Number of polls before exiting (0 for unlimited)
        #[arg(short = 'n', long, default_value = "0")]
        count: u32,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Device selection shared by every kettle command.
#[derive(Debug, Clone, Args)]
pub struct DeviceArgs {
    /// Kettle address or alias (MAC address, or CoreBluetooth UUID on macOS)
    #[arg(short, long, env = "STAGG_DEVICE")]
    pub device: Option<String>,

    /// Connection timeout in seconds (default: from config, or 15)
    #[arg(short = 'T', long)]
    pub timeout: Option<u64>,

    /// Disconnect after every operation instead of keeping the link open
    #[arg(long)]
    pub per_operation: bool,

    /// Send power commands as the short legacy frame (older firmware)
    #[arg(long)]
    pub legacy_power: bool,
}

/// Temperature unit flags for `set-temp`.
#[derive(Debug, Clone, Copy, Default, Args)]
pub struct UnitArgs {
    /// Interpret the value as degrees Celsius
    #[arg(long, conflicts_with = "fahrenheit")]
    pub celsius: bool,

    /// Interpret the value as degrees Fahrenheit
    #[arg(long)]
    pub fahrenheit: bool,
}

impl UnitArgs {
    /// The unit selected by flags, falling back to `default` when neither is set.
    pub fn resolve(self, default: TemperatureUnit) -> TemperatureUnit {
        if self.celsius {
            TemperatureUnit::Celsius
        } else if self.fahrenheit {
            TemperatureUnit::Fahrenheit
        } else {
            default
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn is_on(self) -> bool {
        self == PowerState::On
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Set the default kettle
    SetDevice {
        /// Kettle address
        address: String,
    },

    /// Add or replace an alias for a kettle address
    Alias {
        /// Friendly name
        name: String,
        /// Kettle address
        address: String,
    },

    /// Remove an alias
    Unalias {
        /// Friendly name
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_power_on() {
        let cli = Cli::try_parse_from(["stagg", "power", "on", "-d", "AA:BB:CC:DD:EE:FF"]).unwrap();
        match cli.command {
            Commands::Power { device, state, .. } => {
                assert!(state.is_on());
                assert_eq!(device.device.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
            }
            _ => panic!("expected power command"),
        }
    }

    #[test]
    fn test_parse_set_temp_celsius() {
        let cli = Cli::try_parse_from(["stagg", "set-temp", "93", "--celsius"]).unwrap();
        match cli.command {
            Commands::SetTemp { value, unit, .. } => {
                assert_eq!(value, 93);
                assert_eq!(
                    unit.resolve(TemperatureUnit::Fahrenheit),
                    TemperatureUnit::Celsius
                );
            }
            _ => panic!("expected set-temp command"),
        }
    }

    #[test]
    fn test_parse_set_temp_negative_value() {
        let cli = Cli::try_parse_from(["stagg", "set-temp", "-5"]).unwrap();
        assert!(matches!(cli.command, Commands::SetTemp { value: -5, .. }));
    }

    #[test]
    fn test_unit_flags_conflict() {
        assert!(Cli::try_parse_from(["stagg", "set-temp", "90", "--celsius", "--fahrenheit"]).is_err());
    }

    #[test]
    fn test_unit_default_used_without_flags() {
        let unit = UnitArgs::default();
        assert_eq!(unit.resolve(TemperatureUnit::Celsius), TemperatureUnit::Celsius);
        assert_eq!(
            unit.resolve(TemperatureUnit::Fahrenheit),
            TemperatureUnit::Fahrenheit
        );
    }

    #[test]
    fn test_parse_watch_defaults() {
        let cli = Cli::try_parse_from(["stagg", "watch"]).unwrap();
        match cli.command {
            Commands::Watch {
                interval,
                count,
                format,
                ..
            } => {
                assert_eq!(interval, None);
                assert_eq!(count, 0);
                assert_eq!(format, OutputFormat::Text);
            }
            _ => panic!("expected watch command"),
        }
    }

    #[test]
    fn test_invalid_power_state_rejected() {
        assert!(Cli::try_parse_from(["stagg", "power", "maybe"]).is_err());
    }
}
