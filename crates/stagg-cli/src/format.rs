//! Output formatting for kettle state in text and JSON.

use anyhow::Result;
use serde::Serialize;
use stagg_types::DeviceState;

use crate::style;

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool) -> Self {
        Self { no_color }
    }
}

/// JSON document for one kettle state.
#[derive(Debug, Serialize)]
struct StateJson<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<&'a str>,
    device: &'a str,
    #[serde(flatten)]
    state: &'a DeviceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    heating: Option<bool>,
}

/// Format a state as pretty JSON with a trailing newline.
pub fn format_state_json(device: &str, state: &DeviceState) -> Result<String> {
    let json = StateJson {
        timestamp: None,
        device,
        state,
        heating: state.is_heating(),
    };
    Ok(serde_json::to_string_pretty(&json)? + "\n")
}

/// Format a timestamped state as one compact JSON line, for streaming from `watch`.
pub fn format_state_json_line(
    timestamp: &str,
    device: &str,
    state: &DeviceState,
) -> Result<String> {
    let json = StateJson {
        timestamp: Some(timestamp),
        device,
        state,
        heating: state.is_heating(),
    };
    Ok(serde_json::to_string(&json)? + "\n")
}

/// Format a state as one line of colored text.
pub fn format_state_text(device: &str, state: &DeviceState, opts: &FormatOptions) -> String {
    let name = style::format_device(device, opts.no_color);
    if state.is_empty() {
        return format!("{}: no state received\n", name);
    }

    let unit = state.temperature_unit;
    let mut parts = Vec::new();
    if let Some(power) = state.power {
        parts.push(format!(
            "power {}",
            style::format_power_colored(power, opts.no_color)
        ));
    }
    if let Some(current) = state.current_temperature {
        parts.push(style::format_temp_colored(current, unit, opts.no_color));
    }
    if let Some(target) = state.target_temperature {
        parts.push(format!(
            "-> {}",
            style::format_temp_colored(target, unit, opts.no_color)
        ));
    }
    if state.hold == Some(true) {
        match state.countdown_seconds {
            Some(countdown) => parts.push(format!("hold ({}s)", countdown)),
            None => parts.push("hold".to_string()),
        }
    }
    if state.lifted == Some(true) {
        parts.push("lifted".to_string());
    }

    format!("{}: {}\n", name, parts.join(" "))
}
