//! Colored value formatting for terminal output.

use owo_colors::OwoColorize;
use stagg_types::TemperatureUnit;

/// Water at or above this many degrees Fahrenheit is drawn hot.
const HOT_F: u8 = 175;
/// Celsius equivalent of [`HOT_F`].
const HOT_C: u8 = 80;

/// Format the heater state, green when off and orange when on.
pub fn format_power_colored(on: bool, no_color: bool) -> String {
    let label = if on { "on" } else { "off" };
    if no_color {
        label.to_string()
    } else if on {
        format!("{}", label.truecolor(255, 165, 0))
    } else {
        format!("{}", label.green())
    }
}

/// Format a temperature with its unit symbol, colored by how hot it is.
pub fn format_temp_colored(value: u8, unit: Option<TemperatureUnit>, no_color: bool) -> String {
    let symbol = unit.map(|u| u.symbol()).unwrap_or("°");
    let formatted = format!("{}{}", value, symbol);
    if no_color {
        return formatted;
    }

    let hot = match unit {
        Some(TemperatureUnit::Celsius) => value >= HOT_C,
        _ => value >= HOT_F,
    };
    if hot {
        format!("{}", formatted.red())
    } else {
        format!("{}", formatted.cyan())
    }
}

/// Format a device name or address for headers.
pub fn format_device(name: &str, no_color: bool) -> String {
    if no_color {
        name.to_string()
    } else {
        format!("{}", name.cyan())
    }
}

/// Format a success message.
pub fn format_success(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[OK] {}", message)
    } else {
        format!("{} {}", "[OK]".green(), message)
    }
}

/// Format a warning message.
pub fn format_warning(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[!!] {}", message)
    } else {
        format!("{} {}", "[!!]".yellow(), message)
    }
}
