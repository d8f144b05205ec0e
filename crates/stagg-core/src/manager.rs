//! Address-keyed registry of kettles.
//!
//! [`KettleManager`] hands out one shared [`Kettle`] per address and
//! routes the consumer-facing operations to it. Each kettle has its own
//! lock, so calls for different addresses run independently.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use stagg_types::{DeviceAddress, DeviceState, TemperatureUnit};

use crate::error::Result;
use crate::kettle::{Kettle, KettleConfig};
use crate::traits::KettleTransport;

/// Registry mapping addresses to kettles sharing one transport.
pub struct KettleManager<T: KettleTransport> {
    transport: Arc<T>,
    config: KettleConfig,
    kettles: RwLock<HashMap<DeviceAddress, Arc<Kettle<T>>>>,
}

impl<T: KettleTransport> std::fmt::Debug for KettleManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KettleManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: KettleTransport> KettleManager<T> {
    /// Create a manager whose kettles use the default configuration.
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            config: KettleConfig::default(),
            kettles: RwLock::new(HashMap::new()),
        }
    }

    /// Create a manager whose kettles use `config`.
    pub fn with_config(transport: Arc<T>, config: KettleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            config,
            kettles: RwLock::new(HashMap::new()),
        })
    }

    /// Configuration given to new kettles.
    pub fn config(&self) -> &KettleConfig {
        &self.config
    }

    /// Get the kettle for `address`, creating it on first use.
    pub async fn kettle(&self, address: &DeviceAddress) -> Arc<Kettle<T>> {
        if let Some(kettle) = self.kettles.read().await.get(address) {
            return Arc::clone(kettle);
        }

        let mut kettles = self.kettles.write().await;
        // Another task may have inserted while we waited for the write lock.
        let kettle = kettles.entry(address.clone()).or_insert_with(|| {
            debug!("Registering kettle {}", address);
            Arc::new(Kettle::build_unchecked(
                Arc::clone(&self.transport),
                address.clone(),
                self.config.clone(),
            ))
        });
        Arc::clone(kettle)
    }

    /// Poll the kettle at `address`.
    pub async fn poll(&self, address: &DeviceAddress) -> Result<DeviceState> {
        self.kettle(address).await.poll().await
    }

    /// Switch the heater at `address`.
    pub async fn set_power(&self, address: &DeviceAddress, on: bool) -> Result<()> {
        self.kettle(address).await.set_power(on).await
    }

    /// Set the target temperature at `address`.
    pub async fn set_temperature(
        &self,
        address: &DeviceAddress,
        value: i32,
        unit: TemperatureUnit,
    ) -> Result<()> {
        self.kettle(address)
            .await
            .set_temperature(value, unit)
            .await
    }

    /// Disconnect the kettle at `address`, if it is registered.
    pub async fn disconnect(&self, address: &DeviceAddress) -> Result<()> {
        let kettle = self.kettles.read().await.get(address).cloned();
        match kettle {
            Some(kettle) => kettle.disconnect().await,
            None => Ok(()),
        }
    }

    /// Disconnect and forget the kettle at `address`.
    pub async fn remove(&self, address: &DeviceAddress) -> Result<()> {
        let kettle = self.kettles.write().await.remove(address);
        match kettle {
            Some(kettle) => {
                info!("Removing kettle {}", address);
                kettle.disconnect().await
            }
            None => Ok(()),
        }
    }

    /// Disconnect every registered kettle.
    ///
    /// Returns the first error after attempting all of them.
    pub async fn disconnect_all(&self) -> Result<()> {
        let kettles: Vec<_> = self.kettles.read().await.values().cloned().collect();
        let mut first_error = None;
        for kettle in kettles {
            if let Err(e) = kettle.disconnect().await
                && first_error.is_none()
            {
                first_error = Some(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Registered addresses.
    pub async fn addresses(&self) -> Vec<DeviceAddress> {
        self.kettles.read().await.keys().cloned().collect()
    }

    /// Number of registered kettles.
    pub async fn len(&self) -> usize {
        self.kettles.read().await.len()
    }

    /// Whether no kettle is registered.
    pub async fn is_empty(&self) -> bool {
        self.kettles.read().await.is_empty()
    }
}
