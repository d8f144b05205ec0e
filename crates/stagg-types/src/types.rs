//! Core value types for Stagg kettle control.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Stable identifier of one physical kettle.
///
/// On Linux and Windows this is the Bluetooth MAC address
/// (e.g. `AA:BB:CC:DD:EE:FF`); on macOS it is the UUID assigned by
/// CoreBluetooth. Comparison ignores ASCII case so that `aa:bb:..` and
/// `AA:BB:..` refer to the same kettle.
#[derive(Debug, Clone, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Create an address from any string-like value.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidValue`] if the address is empty or
    /// only whitespace.
    pub fn new(address: impl Into<String>) -> Result<Self, ParseError> {
        let address = address.into();
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(ParseError::InvalidValue(
                "device address must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The address as given by the caller.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased address with separators removed, used for matching
    /// against the identifiers reported by the BLE stack.
    pub fn normalized(&self) -> String {
        self.0.to_ascii_lowercase().replace([':', '-'], "")
    }
}

impl PartialEq for DeviceAddress {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl core::hash::Hash for DeviceAddress {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.0.to_ascii_lowercase().hash(state);
    }
}

impl core::str::FromStr for DeviceAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Temperature scale reported and accepted by the kettle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TemperatureUnit {
    /// Degrees Fahrenheit (factory default on US units).
    #[default]
    Fahrenheit,
    /// Degrees Celsius.
    Celsius,
}

/// Lowest settable target temperature in Fahrenheit.
pub const MIN_TEMP_F: u8 = 104;
/// Highest settable target temperature in Fahrenheit.
pub const MAX_TEMP_F: u8 = 212;
/// Lowest settable target temperature in Celsius.
pub const MIN_TEMP_C: u8 = 40;
/// Highest settable target temperature in Celsius.
pub const MAX_TEMP_C: u8 = 100;

impl TemperatureUnit {
    /// Map the legacy `is_fahrenheit` flag used by host integrations.
    pub fn from_fahrenheit(is_fahrenheit: bool) -> Self {
        if is_fahrenheit {
            TemperatureUnit::Fahrenheit
        } else {
            TemperatureUnit::Celsius
        }
    }

    /// Decode the unit byte that trails temperature notifications.
    ///
    /// The firmware uses `1` for Fahrenheit; every other value is Celsius.
    pub fn from_flag(flag: u8) -> Self {
        Self::from_fahrenheit(flag == 1)
    }

    /// Inclusive range of settable target temperatures.
    ///
    /// ```
    /// use stagg_types::TemperatureUnit;
    ///
    /// assert_eq!(TemperatureUnit::Fahrenheit.range(), (104, 212));
    /// assert_eq!(TemperatureUnit::Celsius.range(), (40, 100));
    /// ```
    pub fn range(&self) -> (u8, u8) {
        match self {
            TemperatureUnit::Fahrenheit => (MIN_TEMP_F, MAX_TEMP_F),
            TemperatureUnit::Celsius => (MIN_TEMP_C, MAX_TEMP_C),
        }
    }

    /// Clamp a requested temperature into the settable range.
    ///
    /// Out-of-range requests are pulled to the nearest bound rather than
    /// rejected, which is what the kettle firmware does with its own dial.
    ///
    /// ```
    /// use stagg_types::TemperatureUnit;
    ///
    /// assert_eq!(TemperatureUnit::Fahrenheit.clamp(400), 212);
    /// assert_eq!(TemperatureUnit::Celsius.clamp(10), 40);
    /// assert_eq!(TemperatureUnit::Celsius.clamp(93), 93);
    /// ```
    #[must_use]
    pub fn clamp(&self, value: i32) -> u8 {
        let (min, max) = self.range();
        // Bounds fit in u8, so the cast after clamping is lossless.
        value.clamp(i32::from(min), i32::from(max)) as u8
    }

    /// Unit suffix for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Fahrenheit => "°F",
            TemperatureUnit::Celsius => "°C",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemperatureUnit::Fahrenheit => write!(f, "Fahrenheit"),
            TemperatureUnit::Celsius => write!(f, "Celsius"),
        }
    }
}

impl core::str::FromStr for TemperatureUnit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "f" | "fahrenheit" => Ok(TemperatureUnit::Fahrenheit),
            "c" | "celsius" => Ok(TemperatureUnit::Celsius),
            other => Err(ParseError::InvalidValue(format!(
                "unknown temperature unit '{}'",
                other
            ))),
        }
    }
}

/// Kind of outbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum CommandKind {
    /// Heater on/off.
    Power = 0,
    /// Target temperature in the kettle's current unit.
    TargetTemperature = 1,
}

impl CommandKind {
    /// Type byte used on the wire.
    pub fn type_byte(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for CommandKind {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CommandKind::Power),
            1 => Ok(CommandKind::TargetTemperature),
            _ => Err(ParseError::UnknownCommandType(value)),
        }
    }
}

/// A logical command sent to the kettle.
///
/// Commands are plain values; a fresh one is built per call and the
/// sequence number is attached only when the session frames it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Command {
    /// What the command changes.
    pub kind: CommandKind,
    /// Raw value byte (0/1 for power, device-scale degrees for temperature).
    pub value: u8,
}

impl Command {
    /// Turn the heater on or off.
    pub fn power(on: bool) -> Self {
        Self {
            kind: CommandKind::Power,
            value: u8::from(on),
        }
    }

    /// Set the target temperature, clamping to the unit's range.
    pub fn target_temperature(value: i32, unit: TemperatureUnit) -> Self {
        Self {
            kind: CommandKind::TargetTemperature,
            value: unit.clamp(value),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CommandKind::Power if self.value == 1 => write!(f, "power on"),
            CommandKind::Power => write!(f, "power off"),
            CommandKind::TargetTemperature => write!(f, "target temperature {}", self.value),
        }
    }
}

/// Snapshot of kettle state decoded from one notification window.
///
/// Every field is optional: a field is present only if the kettle sent
/// the corresponding message during the window. Nothing is filled in
/// from defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceState {
    /// Heater is on.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub power: Option<bool>,
    /// Hold (keep-warm) mode is active.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub hold: Option<bool>,
    /// Target temperature in `temperature_unit`.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub target_temperature: Option<u8>,
    /// Water temperature in `temperature_unit`.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub current_temperature: Option<u8>,
    /// Unit of the most recent temperature message.
    ///
    /// Target and current messages each carry a unit flag; firmware has
    /// been seen to disagree between the two, and the later one wins.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub temperature_unit: Option<TemperatureUnit>,
    /// Hold countdown.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub countdown_seconds: Option<u8>,
    /// Kettle is lifted off its base.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub lifted: Option<bool>,
}

impl DeviceState {
    /// True when no field was decoded.
    pub fn is_empty(&self) -> bool {
        *self == DeviceState::default()
    }

    /// Overlay every field present in `newer` onto `self`.
    pub fn merge(&mut self, newer: &DeviceState) {
        fn take<T: Copy>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.power, newer.power);
        take(&mut self.hold, newer.hold);
        take(&mut self.target_temperature, newer.target_temperature);
        take(&mut self.current_temperature, newer.current_temperature);
        take(&mut self.temperature_unit, newer.temperature_unit);
        take(&mut self.countdown_seconds, newer.countdown_seconds);
        take(&mut self.lifted, newer.lifted);
    }

    /// Whether the water is below target while the heater runs.
    pub fn is_heating(&self) -> Option<bool> {
        match (self.power, self.current_temperature, self.target_temperature) {
            (Some(false), _, _) => Some(false),
            (Some(true), Some(current), Some(target)) => Some(current < target),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "no state");
        }

        let unit = self.temperature_unit.map(|u| u.symbol()).unwrap_or("°");
        let mut parts = Vec::new();
        if let Some(power) = self.power {
            parts.push(format!("power {}", if power { "on" } else { "off" }));
        }
        if let Some(current) = self.current_temperature {
            parts.push(format!("current {}{}", current, unit));
        }
        if let Some(target) = self.target_temperature {
            parts.push(format!("target {}{}", target, unit));
        }
        if let Some(hold) = self.hold {
            parts.push(format!("hold {}", if hold { "on" } else { "off" }));
        }
        if let Some(countdown) = self.countdown_seconds {
            parts.push(format!("countdown {}s", countdown));
        }
        if let Some(lifted) = self.lifted {
            parts.push(if lifted { "lifted" } else { "on base" }.to_string());
        }
        write!(f, "{}", parts.join(", "))
    }
}
