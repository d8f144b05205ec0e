//! Error types for stagg-core.
//!
//! This module defines all error types that can occur when talking to a
//! Stagg kettle over Bluetooth Low Energy.
//!
//! # Error Recovery Strategies
//!
//! | Error Type | Poll path | Command path |
//! |------------|-----------|--------------|
//! | [`Error::NoDevice`] | Cached state if any | Propagated |
//! | [`Error::ConnectTimeout`] | Retried with backoff inside connect | Retried with backoff inside connect |
//! | [`Error::ConnectMaxAttemptsExceeded`] | Cached state if any | Propagated |
//! | [`Error::AuthFailed`] | Cached state if any | Propagated |
//! | [`Error::WriteFailed`] | Cached state if any | Propagated |
//! | [`Error::NotificationTimeout`] | Cached state if any | n/a |
//! | [`Error::DecodeEmpty`] | Cached state if any | n/a |
//!
//! Every failure tears the session down, so the next call reconnects from
//! scratch. No error is fatal to the process.
//!
//! ## Recommended Timeouts
//!
//! | Operation | Recommended Timeout | Notes |
//! |-----------|---------------------|-------|
//! | Connection | 10-15 seconds | Kettle radio is slow to wake on battery |
//! | Write | 5-10 seconds | Writes are unacknowledged |
//! | Notification window | 2 seconds | Full state burst arrives in well under 1s |

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when communicating with a kettle.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The address could not be resolved to a connectable peripheral.
    #[error("No connectable device for address {address}")]
    NoDevice {
        /// The address that was looked up.
        address: String,
    },

    /// A single connection attempt timed out.
    #[error("Connection timed out after {duration:?}")]
    ConnectTimeout {
        /// The timeout that elapsed.
        duration: Duration,
    },

    /// All connection attempts failed.
    #[error("Connection failed after {attempts} attempts: {last_error}")]
    ConnectMaxAttemptsExceeded {
        /// Number of transport connect calls made.
        attempts: u32,
        /// Description of the final failure.
        last_error: String,
    },

    /// The authentication handshake could not be delivered.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// A write to the kettle characteristic failed.
    #[error("Write failed to characteristic {uuid}: {reason}")]
    WriteFailed {
        /// The characteristic UUID.
        uuid: String,
        /// The reason for the failure.
        reason: String,
    },

    /// No notifications arrived during the collection window.
    #[error("No notifications received within {window:?}")]
    NotificationTimeout {
        /// Length of the collection window.
        window: Duration,
    },

    /// Notifications arrived but none decoded to a state field.
    #[error("Received {buffers} notification(s) but none could be decoded")]
    DecodeEmpty {
        /// Number of raw buffers collected.
        buffers: usize,
    },

    /// The host has no usable Bluetooth adapter.
    #[error("No Bluetooth adapter available")]
    NoAdapter,

    /// Operation attempted on a session that is not ready.
    #[error("Not connected to device")]
    NotConnected,

    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Required BLE characteristic not found on device.
    #[error("Characteristic not found: {uuid} (searched in {service_count} services)")]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: String,
        /// Number of services that were searched.
        service_count: usize,
    },

    /// An operation on the transport exceeded its deadline.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A value could not be parsed.
    #[error(transparent)]
    Parse(#[from] stagg_types::ParseError),
}

impl Error {
    /// Create a no-device error for an address.
    pub fn no_device(address: impl Into<String>) -> Self {
        Self::NoDevice {
            address: address.into(),
        }
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a write failure for a characteristic.
    pub fn write_failed(uuid: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            uuid: uuid.into(),
            reason: reason.into(),
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: impl Into<String>, service_count: usize) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.into(),
            service_count,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether another connection attempt may succeed.
    ///
    /// Used by the session's connect loop: timeouts and radio errors are
    /// retried, while a missing characteristic or bad configuration is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ConnectTimeout { .. } => true,
            Error::Timeout { .. } => true,
            Error::Bluetooth(_) => true,
            Error::NotConnected => true,
            Error::WriteFailed { .. } => true,
            Error::NotificationTimeout { .. } => true,
            Error::NoDevice { .. } => false,
            Error::NoAdapter => false,
            Error::ConnectMaxAttemptsExceeded { .. } => false,
            Error::AuthFailed(_) => false,
            Error::DecodeEmpty { .. } => false,
            Error::CharacteristicNotFound { .. } => false,
            Error::InvalidConfig(_) => false,
            Error::Parse(_) => false,
        }
    }
}

/// Result type alias using stagg-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
