//! Poll and command entry points for one kettle.
//!
//! [`Kettle`] is what callers hold. It serialises every operation on its
//! address behind one async mutex, drives the [`SessionManager`], and keeps
//! the last good [`DeviceState`] so that a flaky poll can still answer.
//!
//! Poll failures fall back to the cached state when there is one.
//! Command failures always propagate.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use stagg_types::{Command, DeviceAddress, DeviceState, TemperatureUnit};

use crate::codec::{decode_notifications, legacy_power_frame};
use crate::error::{Error, Result};
use crate::session::{SessionConfig, SessionManager, SessionState};
use crate::traits::KettleTransport;

/// How long notifications are collected during a poll.
pub const DEFAULT_NOTIFICATION_WINDOW: Duration = Duration::from_secs(2);

/// Delay between a command and the refresh poll that follows it.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Frame format used for power commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerFraming {
    /// Sequence-numbered command frame.
    #[default]
    Sequenced,
    /// Fixed on/off frames for early EKG+ firmware.
    Legacy,
}

/// Behaviour of a [`Kettle`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use stagg_core::{KettleConfig, PowerFraming};
///
/// let config = KettleConfig::default()
///     .notification_window(Duration::from_secs(3))
///     .persistent(false)
///     .power_framing(PowerFraming::Legacy);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct KettleConfig {
    /// Session settings.
    pub session: SessionConfig,
    /// Notification collection window for polls.
    pub notification_window: Duration,
    /// Wait before the refresh poll after a command.
    pub settle_delay: Duration,
    /// Keep the link open between operations.
    pub persistent: bool,
    /// Frame format for power commands.
    pub power_framing: PowerFraming,
}

impl Default for KettleConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            notification_window: DEFAULT_NOTIFICATION_WINDOW,
            settle_delay: DEFAULT_SETTLE_DELAY,
            persistent: true,
            power_framing: PowerFraming::Sequenced,
        }
    }
}

impl KettleConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect, act, and disconnect on every call.
    pub fn per_operation() -> Self {
        Self {
            persistent: false,
            ..Self::default()
        }
    }

    /// Set the session settings.
    #[must_use]
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set the notification window.
    #[must_use]
    pub fn notification_window(mut self, window: Duration) -> Self {
        self.notification_window = window;
        self
    }

    /// Set the settle delay.
    #[must_use]
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Keep the session open between calls, or not.
    #[must_use]
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Set the power frame format.
    #[must_use]
    pub fn power_framing(mut self, framing: PowerFraming) -> Self {
        self.power_framing = framing;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.notification_window.is_zero() {
            return Err(Error::invalid_config("notification_window must be non-zero"));
        }
        self.session.validate()
    }
}

struct KettleInner<T: KettleTransport> {
    session: SessionManager<T>,
    cached: Option<DeviceState>,
}

/// A single kettle, addressed by its BLE identifier.
///
/// Cheap to share behind an `Arc`; concurrent calls on the same kettle
/// run one at a time.
pub struct Kettle<T: KettleTransport> {
    address: DeviceAddress,
    config: KettleConfig,
    inner: Mutex<KettleInner<T>>,
}

impl<T: KettleTransport> std::fmt::Debug for Kettle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kettle")
            .field("address", &self.address)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: KettleTransport> Kettle<T> {
    /// Create a kettle with the default configuration.
    pub fn new(transport: Arc<T>, address: DeviceAddress) -> Self {
        Self::build_unchecked(transport, address, KettleConfig::default())
    }

    /// Create a kettle with a custom configuration.
    pub fn with_config(
        transport: Arc<T>,
        address: DeviceAddress,
        config: KettleConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build_unchecked(transport, address, config))
    }

    pub(crate) fn build_unchecked(
        transport: Arc<T>,
        address: DeviceAddress,
        config: KettleConfig,
    ) -> Self {
        let session = SessionManager::new(transport, address.clone(), config.session.clone());
        Self {
            address,
            config,
            inner: Mutex::new(KettleInner {
                session,
                cached: None,
            }),
        }
    }

    /// Address of this kettle.
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Configuration in effect.
    pub fn config(&self) -> &KettleConfig {
        &self.config
    }

    /// Last successfully decoded state, if any.
    pub async fn cached_state(&self) -> Option<DeviceState> {
        self.inner.lock().await.cached
    }

    /// Lifecycle state of the underlying session.
    pub async fn session_state(&self) -> SessionState {
        self.inner.lock().await.session.state()
    }

    /// Sequence number the next command frame will carry.
    pub async fn sequence(&self) -> u8 {
        self.inner.lock().await.session.sequence()
    }

    /// Read the kettle's state.
    ///
    /// Connects if needed, collects notifications for the configured
    /// window and decodes them. When that fails and an earlier poll
    /// succeeded, the earlier state is returned instead of the error.
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.address))]
    pub async fn poll(&self) -> Result<DeviceState> {
        let mut inner = self.inner.lock().await;

        let result = match Self::poll_once(&mut inner.session, self.config.notification_window)
            .await
        {
            Ok(state) => {
                debug!("Polled state: {}", state);
                inner.cached = Some(state);
                Ok(state)
            }
            Err(e) => {
                Self::teardown(&mut inner.session).await;
                match inner.cached {
                    Some(cached) => {
                        warn!("Poll failed ({}), returning last known state", e);
                        Ok(cached)
                    }
                    None => Err(e),
                }
            }
        };

        self.finish(&mut inner.session).await;
        result
    }

    async fn poll_once(session: &mut SessionManager<T>, window: Duration) -> Result<DeviceState> {
        session.ensure_ready().await?;
        let buffers = session.read_notifications(window).await?;
        let state = decode_notifications(&buffers);
        if state.is_empty() {
            return Err(Error::DecodeEmpty {
                buffers: buffers.len(),
            });
        }
        Ok(state)
    }

    /// Turn the heater on or off.
    ///
    /// Returns once the frame is written; the kettle does not acknowledge.
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.address, on = on))]
    pub async fn set_power(&self, on: bool) -> Result<()> {
        let mut inner = self.inner.lock().await;

        let result = match self.config.power_framing {
            PowerFraming::Sequenced => {
                Self::send(&mut inner.session, Command::power(on)).await
            }
            PowerFraming::Legacy => {
                Self::send_raw(&mut inner.session, &legacy_power_frame(on)).await
            }
        };

        if result.is_ok() {
            info!("Power {}", if on { "on" } else { "off" });
        }
        self.finish(&mut inner.session).await;
        result
    }

    /// Set the target temperature.
    ///
    /// `value` is silently clamped to the unit's settable range.
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.address, value = value, unit = %unit))]
    pub async fn set_temperature(&self, value: i32, unit: TemperatureUnit) -> Result<()> {
        let command = Command::target_temperature(value, unit);
        if i32::from(command.value) != value {
            debug!(
                "Clamped {}{} to {}{}",
                value,
                unit.symbol(),
                command.value,
                unit.symbol()
            );
        }

        let mut inner = self.inner.lock().await;
        let result = Self::send(&mut inner.session, command).await;
        if result.is_ok() {
            info!("Target temperature {}{}", command.value, unit.symbol());
        }
        self.finish(&mut inner.session).await;
        result
    }

    /// Wait for the kettle to apply a command, then poll.
    pub async fn refresh_after_settle(&self) -> Result<DeviceState> {
        sleep(self.config.settle_delay).await;
        self.poll().await
    }

    /// Close the link. Safe to call repeatedly.
    pub async fn disconnect(&self) -> Result<()> {
        self.inner.lock().await.session.disconnect().await
    }

    async fn send(session: &mut SessionManager<T>, command: Command) -> Result<()> {
        let result = match session.ensure_ready().await {
            Ok(()) => session.send_command(command).await,
            Err(e) => Err(e),
        };
        if result.is_err() {
            Self::teardown(session).await;
        }
        result
    }

    async fn send_raw(session: &mut SessionManager<T>, frame: &[u8]) -> Result<()> {
        let result = match session.ensure_ready().await {
            Ok(()) => session.write(frame).await,
            Err(e) => Err(e),
        };
        if result.is_err() {
            Self::teardown(session).await;
        }
        result
    }

    async fn teardown(session: &mut SessionManager<T>) {
        if let Err(e) = session.disconnect().await {
            debug!("Disconnect after failure failed: {}", e);
        }
    }

    /// Drop the link after each call in per-operation mode.
    async fn finish(&self, session: &mut SessionManager<T>) {
        if !self.config.persistent {
            Self::teardown(session).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    fn address() -> DeviceAddress {
        DeviceAddress::new("AA:BB:CC:DD:EE:FF").unwrap()
    }

    fn burst() -> Vec<Vec<u8>> {
        vec![
            vec![0xEF, 0xDD, 0x00],
            vec![1],
            vec![0xEF, 0xDD, 0x02],
            vec![205, 1],
            vec![0xEF, 0xDD, 0x03],
            vec![150, 1],
        ]
    }

    fn kettle(transport: &Arc<MockTransport>) -> Kettle<MockTransport> {
        Kettle::new(Arc::clone(transport), address())
    }

    #[test]
    fn test_config_defaults() {
        let config = KettleConfig::default();
        assert_eq!(config.notification_window, Duration::from_secs(2));
        assert_eq!(config.settle_delay, Duration::from_millis(500));
        assert!(config.persistent);
        assert_eq!(config.power_framing, PowerFraming::Sequenced);
        assert!(!KettleConfig::per_operation().persistent);
    }

    #[test]
    fn test_with_config_validates() {
        let transport = Arc::new(MockTransport::new());
        let bad = KettleConfig::default().notification_window(Duration::ZERO);
        assert!(Kettle::with_config(transport, address(), bad).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_decodes_and_caches() {
        let transport = Arc::new(MockTransport::new());
        transport.set_notifications(burst());
        let kettle = kettle(&transport);

        let state = kettle.poll().await.unwrap();
        assert_eq!(state.power, Some(true));
        assert_eq!(state.target_temperature, Some(205));
        assert_eq!(state.current_temperature, Some(150));
        assert_eq!(kettle.cached_state().await, Some(state));
        assert_eq!(kettle.session_state().await, SessionState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_failure_propagates() {
        let transport = Arc::new(MockTransport::new());
        let kettle = kettle(&transport);

        let err = kettle.poll().await.unwrap_err();
        assert!(matches!(err, Error::NotificationTimeout { .. }));
        assert!(kettle.cached_state().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_falls_back_to_cache() {
        let transport = Arc::new(MockTransport::new());
        transport.set_notifications(burst());
        let kettle = kettle(&transport);
        let good = kettle.poll().await.unwrap();

        transport.clear_notifications();
        assert_eq!(kettle.poll().await.unwrap(), good);

        transport.set_reachable(false);
        transport.drop_link();
        assert_eq!(kettle.poll().await.unwrap(), good);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_burst_is_decode_empty() {
        let transport = Arc::new(MockTransport::new());
        transport.set_notifications(vec![vec![0x00, 0x01, 0x02], vec![0x03]]);
        let kettle = kettle(&transport);

        let err = kettle.poll().await.unwrap_err();
        assert!(matches!(err, Error::DecodeEmpty { buffers: 2 }));
        assert_eq!(kettle.session_state().await, SessionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_device_without_cache() {
        let transport = Arc::new(MockTransport::new());
        transport.set_reachable(false);
        let kettle = kettle(&transport);

        assert!(matches!(kettle.poll().await, Err(Error::NoDevice { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_power_writes_sequenced_frame() {
        let transport = Arc::new(MockTransport::new());
        let kettle = kettle(&transport);

        kettle.set_power(true).await.unwrap();
        assert_eq!(
            transport.command_frames(),
            vec![vec![0xEF, 0xDD, 0x0A, 0x00, 0x00, 0x01, 0x01, 0x00]]
        );
        assert_eq!(kettle.sequence().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_power_legacy_framing() {
        let transport = Arc::new(MockTransport::new());
        let config = KettleConfig::default().power_framing(PowerFraming::Legacy);
        let kettle = Kettle::with_config(Arc::clone(&transport), address(), config).unwrap();

        kettle.set_power(false).await.unwrap();
        assert_eq!(
            transport.command_frames(),
            vec![vec![0xEF, 0xDD, 0x0A, 0x04, 0x00, 0x00, 0x04, 0x00]]
        );
        // Legacy frames carry no sequence number.
        assert_eq!(kettle.sequence().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_temperature_clamps() {
        let transport = Arc::new(MockTransport::new());
        let kettle = kettle(&transport);

        kettle
            .set_temperature(400, TemperatureUnit::Fahrenheit)
            .await
            .unwrap();
        kettle
            .set_temperature(10, TemperatureUnit::Celsius)
            .await
            .unwrap();

        let values: Vec<u8> = transport.command_frames().iter().map(|f| f[5]).collect();
        assert_eq!(values, vec![212, 40]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_errors_never_use_cache() {
        let transport = Arc::new(MockTransport::new());
        transport.set_notifications(burst());
        let kettle = kettle(&transport);
        kettle.poll().await.unwrap();

        transport.fail_writes(1);
        assert!(kettle.set_power(false).await.is_err());
        assert_eq!(kettle.session_state().await, SessionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_after_settle_polls() {
        let transport = Arc::new(MockTransport::new());
        transport.set_notifications(burst());
        let kettle = kettle(&transport);

        kettle.set_power(true).await.unwrap();
        let started = tokio::time::Instant::now();
        let state = kettle.refresh_after_settle().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(state.power, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_operation_mode_disconnects() {
        let transport = Arc::new(MockTransport::new());
        transport.set_notifications(burst());
        let kettle =
            Kettle::with_config(Arc::clone(&transport), address(), KettleConfig::per_operation())
                .unwrap();

        kettle.poll().await.unwrap();
        assert_eq!(kettle.session_state().await, SessionState::Disconnected);
        kettle.set_power(true).await.unwrap();
        assert_eq!(transport.connect_count(), 2);
        assert_eq!(transport.disconnect_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_idempotent() {
        let transport = Arc::new(MockTransport::new());
        let kettle = kettle(&transport);

        kettle.disconnect().await.unwrap();
        kettle.set_power(true).await.unwrap();
        kettle.disconnect().await.unwrap();
        kettle.disconnect().await.unwrap();
        assert_eq!(transport.disconnect_count(), 1);
    }
}
