//! In-memory transport for testing.
//!
//! [`MockTransport`] implements [`KettleTransport`] without any BLE
//! hardware. It records every call the session layer makes so tests can
//! assert on ordering and timing, and it can be told to fail.
//!
//! # Features
//!
//! - **Failure injection**: unreachable address, failing connects, failing writes
//! - **Scripted notifications**: a burst delivered on every subscribe
//! - **Call recording**: counts plus `tokio::time::Instant` of every connect and write
//! - **Latency simulation**: connect delay that honours the connect timeout
//!
//! ```
//! use std::sync::Arc;
//! use stagg_core::{Kettle, MockTransport};
//! use stagg_types::DeviceAddress;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let transport = Arc::new(MockTransport::new());
//! transport.set_notifications(vec![vec![0xEF, 0xDD, 0x00], vec![1]]);
//!
//! let address = DeviceAddress::new("AA:BB:CC:DD:EE:FF").unwrap();
//! let kettle = Kettle::new(transport.clone(), address);
//! let state = kettle.poll().await.unwrap();
//! assert_eq!(state.power, Some(true));
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};

use stagg_types::DeviceAddress;

use crate::codec::{COMMAND_FLAG, COMMAND_FRAME_LEN, FRAME_MAGIC};
use crate::error::{Error, Result};
use crate::traits::{KettleTransport, NotificationHandler, TransportLink};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Take one unit from a failure budget, returning whether one was available.
fn consume(budget: &AtomicU32) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[derive(Default)]
struct Shared {
    unreachable: AtomicBool,
    connect_failures: AtomicU32,
    write_failures: AtomicU32,
    connect_latency_ms: AtomicU64,
    resolve_count: AtomicU32,
    connect_count: AtomicU32,
    disconnect_count: AtomicU32,
    subscribe_count: AtomicU32,
    unsubscribe_count: AtomicU32,
    connect_instants: Mutex<Vec<Instant>>,
    writes: Mutex<Vec<(Instant, Vec<u8>)>>,
    notifications: Mutex<Vec<Vec<u8>>>,
    current_link: Mutex<Option<Arc<AtomicBool>>>,
}

/// A kettle transport that lives entirely in memory.
#[derive(Default)]
pub struct MockTransport {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("connects", &self.connect_count())
            .field("writes", &lock(&self.shared.writes).len())
            .finish_non_exhaustive()
    }
}

impl MockTransport {
    /// Create a reachable transport with no scripted notifications.
    pub fn new() -> Self {
        Self::default()
    }

    // --- Failure injection ---

    /// Make `resolve` return `None` while `false`.
    pub fn set_reachable(&self, reachable: bool) {
        self.shared.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Fail the next `count` connects with a connect timeout.
    pub fn fail_connects(&self, count: u32) {
        self.shared.connect_failures.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` writes, including the connect handshake.
    pub fn fail_writes(&self, count: u32) {
        self.shared.write_failures.store(count, Ordering::SeqCst);
    }

    /// Delay every connect by `latency`.
    pub fn set_connect_latency(&self, latency: Duration) {
        self.shared
            .connect_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Simulate the kettle walking out of range on the open link.
    pub fn drop_link(&self) {
        if let Some(flag) = lock(&self.shared.current_link).as_ref() {
            flag.store(false, Ordering::SeqCst);
        }
    }

    // --- Scripted data ---

    /// Buffers delivered, in order, to every new subscription.
    pub fn set_notifications(&self, buffers: Vec<Vec<u8>>) {
        *lock(&self.shared.notifications) = buffers;
    }

    /// Stop delivering notifications.
    pub fn clear_notifications(&self) {
        lock(&self.shared.notifications).clear();
    }

    // --- Recording ---

    /// Number of `resolve` calls.
    pub fn resolve_count(&self) -> u32 {
        self.shared.resolve_count.load(Ordering::SeqCst)
    }

    /// Number of transport connect calls, successful or not.
    pub fn connect_count(&self) -> u32 {
        self.shared.connect_count.load(Ordering::SeqCst)
    }

    /// When each connect call started.
    pub fn connect_instants(&self) -> Vec<Instant> {
        lock(&self.shared.connect_instants).clone()
    }

    /// Number of disconnects of an open link.
    pub fn disconnect_count(&self) -> u32 {
        self.shared.disconnect_count.load(Ordering::SeqCst)
    }

    /// Number of subscribe calls.
    pub fn subscribe_count(&self) -> u32 {
        self.shared.subscribe_count.load(Ordering::SeqCst)
    }

    /// Number of unsubscribe calls.
    pub fn unsubscribe_count(&self) -> u32 {
        self.shared.unsubscribe_count.load(Ordering::SeqCst)
    }

    /// Every successful write, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.shared.writes)
            .iter()
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }

    /// When each successful write happened.
    pub fn write_instants(&self) -> Vec<Instant> {
        lock(&self.shared.writes).iter().map(|(at, _)| *at).collect()
    }

    /// Successful writes that are 8-byte command frames.
    pub fn command_frames(&self) -> Vec<Vec<u8>> {
        self.writes()
            .into_iter()
            .filter(|w| {
                w.len() == COMMAND_FRAME_LEN && w[..2] == FRAME_MAGIC && w[2] == COMMAND_FLAG
            })
            .collect()
    }

    /// Forget recorded writes.
    pub fn clear_writes(&self) {
        lock(&self.shared.writes).clear();
    }
}

/// A resolved mock peripheral.
#[derive(Debug, Clone)]
pub struct MockPeripheral {
    /// Address it was resolved from.
    pub address: DeviceAddress,
}

/// An open mock connection.
pub struct MockLink {
    shared: Arc<Shared>,
    connected: Arc<AtomicBool>,
    handler: Mutex<Option<NotificationHandler>>,
}

impl std::fmt::Debug for MockLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLink")
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KettleTransport for MockTransport {
    type Device = MockPeripheral;
    type Link = MockLink;

    async fn resolve(&self, address: &DeviceAddress) -> Result<Option<MockPeripheral>> {
        self.shared.resolve_count.fetch_add(1, Ordering::SeqCst);
        if self.shared.unreachable.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(MockPeripheral {
            address: address.clone(),
        }))
    }

    async fn connect(&self, _device: &MockPeripheral, timeout: Duration) -> Result<MockLink> {
        self.shared.connect_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.shared.connect_instants).push(Instant::now());

        let latency =
            Duration::from_millis(self.shared.connect_latency_ms.load(Ordering::SeqCst));
        if latency > timeout {
            sleep(timeout).await;
            return Err(Error::ConnectTimeout { duration: timeout });
        }
        if !latency.is_zero() {
            sleep(latency).await;
        }

        if consume(&self.shared.connect_failures) {
            return Err(Error::ConnectTimeout { duration: timeout });
        }

        let connected = Arc::new(AtomicBool::new(true));
        *lock(&self.shared.current_link) = Some(Arc::clone(&connected));
        Ok(MockLink {
            shared: Arc::clone(&self.shared),
            connected,
            handler: Mutex::new(None),
        })
    }
}

impl MockLink {
    fn check_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}

#[async_trait]
impl TransportLink for MockLink {
    async fn write(&self, bytes: &[u8]) -> Result<()> {
        self.check_connected()?;
        if consume(&self.shared.write_failures) {
            return Err(Error::write_failed(
                crate::uuids::KETTLE_CHARACTERISTIC.to_string(),
                "injected failure",
            ));
        }
        lock(&self.shared.writes).push((Instant::now(), bytes.to_vec()));
        Ok(())
    }

    async fn subscribe(&self, handler: NotificationHandler) -> Result<()> {
        self.check_connected()?;
        self.shared.subscribe_count.fetch_add(1, Ordering::SeqCst);

        let burst = lock(&self.shared.notifications).clone();
        for buffer in &burst {
            handler(buffer);
        }
        *lock(&self.handler) = Some(handler);
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<()> {
        self.check_connected()?;
        self.shared.unsubscribe_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.handler).take();
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        lock(&self.handler).take();
        // swap() makes a second disconnect a no-op.
        if self.connected.swap(false, Ordering::SeqCst) {
            self.shared.disconnect_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
