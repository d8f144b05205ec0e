//! Command-line interface for Fellow Stagg kettles.
//!
//! The `stagg` binary reads and controls Stagg EKG+ and EKG Pro kettles
//! over Bluetooth Low Energy using [`stagg_core`].
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `status` | Read the kettle state once |
//! | `power` | Switch the heater on or off |
//! | `set-temp` | Set the target temperature |
//! | `watch` | Poll on a fixed cadence until Ctrl+C |
//! | `config` | Show or edit the configuration file |
//! | `completions` | Generate shell completions |
//!
//! # Configuration
//!
//! Settings live in `~/.config/stagg/config.toml` (or the platform
//! equivalent):
//!
//! ```toml
//! device = "kitchen"
//! temperature_unit = "celsius"
//! timeout = 15
//! watch_interval = 30
//!
//! [aliases]
//! kitchen = "C4:AB:12:34:56:78"
//! ```
//!
//! Command-line flags override file values.
//!
//! # Environment Variables
//!
//! - `STAGG_DEVICE`: Default kettle address or alias (overridden by `--device`)
//! - `NO_COLOR`: Disable colored output when set
//! - `RUST_LOG`: Log filter when neither `--verbose` nor `--quiet` is given
//!
//! # Examples
//!
//! ```bash
//! stagg status --device C4:AB:12:34:56:78
//! stagg set-temp 93 --celsius
//! stagg power on
//! stagg watch --interval 10 --format json --output kettle.jsonl
//! ```

// Re-export core dependencies for convenience
pub use stagg_core;
pub use stagg_types;
