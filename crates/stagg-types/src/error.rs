//! Error types for data parsing in stagg-types.

use thiserror::Error;

/// Errors that can occur when interpreting raw kettle values.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in stagg-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A byte did not map to a known command type.
    #[error("Unknown command type: 0x{0:02X}")]
    UnknownCommandType(u8),

    /// A textual value could not be parsed.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Result type alias using stagg-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
