//! btleplug implementation of the kettle transport.
//!
//! [`BleTransport`] resolves addresses against the host's first Bluetooth
//! adapter and opens [`BleLink`]s to the kettle's serial characteristic.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::{Adapter, Peripheral};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use stagg_types::DeviceAddress;

use crate::error::{Error, Result};
use crate::scan::{ScanOptions, find_peripheral, get_adapter};
use crate::traits::{KettleTransport, NotificationHandler, TransportLink};
use crate::uuids::{KETTLE_CHARACTERISTIC, KETTLE_SERVICE, PRO_VENDOR_SERVICE};

/// Default timeout for service discovery after connecting.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Kettle transport over the host Bluetooth stack.
pub struct BleTransport {
    adapter: Adapter,
    scan_options: ScanOptions,
    discovery_timeout: Duration,
}

impl std::fmt::Debug for BleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleTransport")
            .field("scan_options", &self.scan_options)
            .field("discovery_timeout", &self.discovery_timeout)
            .finish_non_exhaustive()
    }
}

impl BleTransport {
    /// Use the first Bluetooth adapter on this host.
    pub async fn new() -> Result<Self> {
        Ok(Self::with_adapter(get_adapter().await?))
    }

    /// Use a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self {
            adapter,
            scan_options: ScanOptions::default(),
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }

    /// Set how hard `resolve` scans for unknown kettles.
    #[must_use]
    pub fn scan_options(mut self, options: ScanOptions) -> Self {
        self.scan_options = options;
        self
    }

    /// Set the service discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// The adapter in use.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }
}

/// Locate the serial characteristic on a connected peripheral.
fn find_characteristic(peripheral: &Peripheral) -> Result<Characteristic> {
    let service_count = peripheral.services().len();
    pick_characteristic(&peripheral.characteristics())
        .cloned()
        .ok_or_else(|| {
            Error::characteristic_not_found(KETTLE_CHARACTERISTIC.to_string(), service_count)
        })
}

/// Choose the serial characteristic, preferring the kettle service, then
/// the EKG Pro vendor service, then any service that carries it.
fn pick_characteristic<'a, I>(characteristics: I) -> Option<&'a Characteristic>
where
    I: IntoIterator<Item = &'a Characteristic>,
{
    characteristics
        .into_iter()
        .filter(|c| c.uuid == KETTLE_CHARACTERISTIC)
        .min_by_key(|c| match c.service_uuid {
            service if service == KETTLE_SERVICE => 0,
            service if service == PRO_VENDOR_SERVICE => 1,
            _ => 2,
        })
}

#[async_trait]
impl KettleTransport for BleTransport {
    type Device = Peripheral;
    type Link = BleLink;

    async fn resolve(&self, address: &DeviceAddress) -> Result<Option<Peripheral>> {
        find_peripheral(&self.adapter, address, &self.scan_options).await
    }

    #[tracing::instrument(level = "info", skip_all, fields(timeout = ?connect_timeout))]
    async fn connect(&self, device: &Peripheral, connect_timeout: Duration) -> Result<BleLink> {
        info!("Connecting to kettle...");
        timeout(connect_timeout, device.connect())
            .await
            .map_err(|_| Error::ConnectTimeout {
                duration: connect_timeout,
            })??;

        debug!("Discovering services...");
        let discovered = timeout(self.discovery_timeout, device.discover_services()).await;
        let discovered = match discovered {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::timeout("discover services", self.discovery_timeout)),
        };
        let characteristic = discovered.and_then(|()| find_characteristic(device));

        match characteristic {
            Ok(characteristic) => {
                info!("Connected, using characteristic {}", characteristic.uuid);
                Ok(BleLink {
                    peripheral: device.clone(),
                    characteristic,
                    notification_task: Mutex::new(None),
                })
            }
            Err(e) => {
                if let Err(disconnect_error) = device.disconnect().await {
                    debug!("Disconnect after failed setup: {}", disconnect_error);
                }
                Err(e)
            }
        }
    }
}

/// An open connection to a kettle's serial characteristic.
pub struct BleLink {
    peripheral: Peripheral,
    characteristic: Characteristic,
    notification_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for BleLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleLink")
            .field("characteristic", &self.characteristic.uuid)
            .finish_non_exhaustive()
    }
}

impl BleLink {
    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.notification_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn abort_notification_task(&self) {
        if let Some(handle) = self.task().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl TransportLink for BleLink {
    async fn write(&self, bytes: &[u8]) -> Result<()> {
        self.peripheral
            .write(&self.characteristic, bytes, WriteType::WithoutResponse)
            .await
            .map_err(|e| Error::write_failed(self.characteristic.uuid.to_string(), e.to_string()))
    }

    async fn subscribe(&self, handler: NotificationHandler) -> Result<()> {
        self.abort_notification_task();

        // Open the stream first so the burst that follows subscribing is not lost.
        let mut stream = self.peripheral.notifications().await?;
        self.peripheral.subscribe(&self.characteristic).await?;

        let char_uuid = self.characteristic.uuid;
        let handle = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid == char_uuid {
                    handler(&notification.value);
                }
            }
        });
        *self.task() = Some(handle);
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<()> {
        self.abort_notification_task();
        self.peripheral.unsubscribe(&self.characteristic).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.abort_notification_task();
        if self.peripheral.is_connected().await.unwrap_or(false) {
            info!("Disconnecting from kettle");
            self.peripheral.disconnect().await?;
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }
}

impl Drop for BleLink {
    fn drop(&mut self) {
        if let Some(handle) = self.task().take() {
            warn!("Link dropped with an active notification task, aborting it");
            handle.abort();
        }
    }
}
