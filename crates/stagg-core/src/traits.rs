//! Transport abstractions.
//!
//! The session layer never talks to a BLE stack directly. It goes through
//! [`KettleTransport`] to find and connect a kettle, and through the
//! resulting [`TransportLink`] for everything that happens on an open
//! connection. [`BleTransport`](crate::BleTransport) implements these over
//! btleplug; [`MockTransport`](crate::MockTransport) implements them in
//! memory for tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use stagg_types::DeviceAddress;

use crate::error::Result;

/// Callback invoked with the raw bytes of each notification, in arrival order.
pub type NotificationHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Finds kettles and opens connections to them.
///
/// # Example
///
/// ```ignore
/// use stagg_core::{KettleTransport, TransportLink, Result};
/// use stagg_types::DeviceAddress;
///
/// async fn ping<T: KettleTransport>(transport: &T, address: &DeviceAddress) -> Result<bool> {
///     let Some(device) = transport.resolve(address).await? else {
///         return Ok(false);
///     };
///     let link = transport.connect(&device, std::time::Duration::from_secs(15)).await?;
///     let connected = link.is_connected().await;
///     link.disconnect().await?;
///     Ok(connected)
/// }
/// ```
#[async_trait]
pub trait KettleTransport: Send + Sync + 'static {
    /// Handle to a resolved but not yet connected peripheral.
    type Device: Send + Sync + 'static;
    /// An open connection.
    type Link: TransportLink;

    /// Look up a connectable peripheral for `address`.
    ///
    /// `Ok(None)` means the address is not currently reachable.
    async fn resolve(&self, address: &DeviceAddress) -> Result<Option<Self::Device>>;

    /// Open a connection, giving up after `timeout`.
    ///
    /// Implementations return [`Error::ConnectTimeout`](crate::Error::ConnectTimeout)
    /// when the deadline passes.
    async fn connect(&self, device: &Self::Device, timeout: Duration) -> Result<Self::Link>;
}

/// Operations on an open connection to the kettle's serial characteristic.
#[async_trait]
pub trait TransportLink: Send + Sync + 'static {
    /// Write raw bytes to the kettle characteristic.
    async fn write(&self, bytes: &[u8]) -> Result<()>;

    /// Start delivering notifications to `handler`.
    ///
    /// A second subscribe replaces the previous handler.
    async fn subscribe(&self, handler: NotificationHandler) -> Result<()>;

    /// Stop delivering notifications.
    async fn unsubscribe(&self) -> Result<()>;

    /// Close the connection. Calling this on a closed link is a no-op.
    async fn disconnect(&self) -> Result<()>;

    /// Whether the underlying stack still reports the link as connected.
    async fn is_connected(&self) -> bool;
}
