//! Per-address BLE session.
//!
//! A [`SessionManager`] owns the one logical session that exists for a
//! kettle address. It connects with retry and backoff, authenticates,
//! debounces writes, frames commands with a rolling sequence number, and
//! tears the link down on any transport failure so that the next call
//! starts from a clean slate.
//!
//! ```text
//! Disconnected ──► Connecting ──► Authenticating ──► Ready
//!       ▲               │                │             │
//!       └───────────────┴────────────────┴─────────────┘
//!                     failure / disconnect
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use stagg_types::{Command, DeviceAddress};

use crate::backoff::BackoffPolicy;
use crate::codec::{auth_sequence, encode_command, hex};
use crate::error::{Error, Result};
use crate::traits::{KettleTransport, NotificationHandler, TransportLink};

/// Default timeout for one transport connect.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for a single characteristic write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimum spacing between two writes on one session.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Connection and write behaviour of a session.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use stagg_core::{BackoffPolicy, SessionConfig};
///
/// let config = SessionConfig::default()
///     .connect_timeout(Duration::from_secs(20))
///     .backoff(BackoffPolicy::patient());
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Deadline for each transport connect.
    pub connect_timeout: Duration,
    /// Deadline for each write.
    pub write_timeout: Duration,
    /// Minimum time between two writes.
    pub debounce: Duration,
    /// Attempt limit and delays for connecting.
    pub backoff: BackoffPolicy,
    /// Send the handshake after subscribing so the kettle replays its state.
    pub request_state_on_poll: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            debounce: DEFAULT_DEBOUNCE,
            backoff: BackoffPolicy::default(),
            request_state_on_poll: true,
        }
    }
}

impl SessionConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorter deadlines for a kettle sitting next to the adapter.
    pub fn fast() -> Self {
        Self {
            connect_timeout: Duration::from_secs(8),
            write_timeout: Duration::from_secs(5),
            ..Self::default()
        }
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the write debounce interval.
    #[must_use]
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the backoff policy.
    #[must_use]
    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Enable or disable the state request during polls.
    #[must_use]
    pub fn request_state_on_poll(mut self, enabled: bool) -> Self {
        self.request_state_on_poll = enabled;
        self
    }

    /// Reject zero timeouts and invalid backoff settings.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(Error::invalid_config("connect_timeout must be non-zero"));
        }
        if self.write_timeout.is_zero() {
            return Err(Error::invalid_config("write_timeout must be non-zero"));
        }
        self.backoff.validate()
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No link.
    Disconnected,
    /// A transport connect is in flight.
    Connecting,
    /// Connected, handshake in flight.
    Authenticating,
    /// Authenticated; writes and reads are accepted.
    Ready,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Authenticating => write!(f, "authenticating"),
            SessionState::Ready => write!(f, "ready"),
        }
    }
}

/// Bookkeeping for the one session of an address.
struct Session<L> {
    link: Option<L>,
    state: SessionState,
    sequence: u8,
    consecutive_failures: u32,
    last_activity: Option<Instant>,
    last_write: Option<Instant>,
}

impl<L> Session<L> {
    fn new() -> Self {
        Self {
            link: None,
            state: SessionState::Disconnected,
            sequence: 0,
            consecutive_failures: 0,
            last_activity: None,
            last_write: None,
        }
    }
}

/// Owns and drives the session for a single kettle address.
///
/// All methods take `&mut self`; callers that share a manager wrap it in
/// a mutex, which is what [`Kettle`](crate::Kettle) does.
pub struct SessionManager<T: KettleTransport> {
    transport: Arc<T>,
    address: DeviceAddress,
    config: SessionConfig,
    session: Session<T::Link>,
}

impl<T: KettleTransport> std::fmt::Debug for SessionManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("address", &self.address)
            .field("state", &self.session.state)
            .field("sequence", &self.session.sequence)
            .field("consecutive_failures", &self.session.consecutive_failures)
            .finish_non_exhaustive()
    }
}

impl<T: KettleTransport> SessionManager<T> {
    /// Create a manager in the `Disconnected` state with sequence 0.
    pub fn new(transport: Arc<T>, address: DeviceAddress, config: SessionConfig) -> Self {
        Self {
            transport,
            address,
            config,
            session: Session::new(),
        }
    }

    /// Address this session belongs to.
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.session.state
    }

    /// Whether writes and reads are currently accepted.
    pub fn is_ready(&self) -> bool {
        self.session.state == SessionState::Ready
    }

    /// Sequence number the next command frame will carry.
    pub fn sequence(&self) -> u8 {
        self.session.sequence
    }

    /// Failed transport connects since the last success or exhaustion.
    pub fn consecutive_failures(&self) -> u32 {
        self.session.consecutive_failures
    }

    /// Time of the last successful operation on the link.
    pub fn last_activity(&self) -> Option<Instant> {
        self.session.last_activity
    }

    /// Make sure the session is `Ready`, reconnecting if needed.
    ///
    /// The address is resolved only when a connect is required. A `Ready`
    /// session whose link dropped underneath is torn down and rebuilt.
    pub async fn ensure_ready(&mut self) -> Result<()> {
        if self.session.state == SessionState::Ready {
            let alive = match &self.session.link {
                Some(link) => link.is_connected().await,
                None => false,
            };
            if alive {
                return Ok(());
            }
            warn!(address = %self.address, "Unexpected disconnection, reconnecting");
            self.teardown().await;
        }

        let device = self
            .transport
            .resolve(&self.address)
            .await?
            .ok_or_else(|| Error::no_device(self.address.as_str()))?;

        self.connect(&device).await
    }

    /// Connect to a resolved device and authenticate.
    ///
    /// Makes up to `backoff.max_attempts` transport connects, sleeping
    /// `backoff.delay_for_attempt(n)` after failed attempt `n`. When every
    /// attempt fails the failure counter is reset and
    /// [`Error::ConnectMaxAttemptsExceeded`] is returned. Errors that
    /// retrying cannot fix end the loop early. A handshake failure closes
    /// the link and returns [`Error::AuthFailed`] without retrying.
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.address))]
    pub async fn connect(&mut self, device: &T::Device) -> Result<()> {
        if self.session.link.is_some() {
            self.teardown().await;
        }

        let max_attempts = self.config.backoff.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            self.session.state = SessionState::Connecting;
            debug!("Connect attempt {}/{}", attempt, max_attempts);

            match self
                .transport
                .connect(device, self.config.connect_timeout)
                .await
            {
                Ok(link) => {
                    info!("Connected on attempt {}", attempt);
                    self.session.consecutive_failures = 0;
                    return self.authenticate(link).await;
                }
                Err(e) => {
                    self.session.consecutive_failures += 1;
                    self.session.state = SessionState::Disconnected;

                    if !e.is_retryable() {
                        warn!("Connect failed with non-retryable error: {}", e);
                        self.session.consecutive_failures = 0;
                        return Err(e);
                    }

                    last_error = e.to_string();
                    if attempt < max_attempts {
                        let delay = self.config.backoff.delay_for_attempt(attempt);
                        warn!(
                            "Connect failed (attempt {}/{}): {}, retrying in {:?}",
                            attempt, max_attempts, e, delay
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        warn!(
            "Giving up after {} connect attempts: {}",
            max_attempts, last_error
        );
        self.session.consecutive_failures = 0;
        Err(Error::ConnectMaxAttemptsExceeded {
            attempts: max_attempts,
            last_error,
        })
    }

    async fn authenticate(&mut self, link: T::Link) -> Result<()> {
        self.session.state = SessionState::Authenticating;
        self.ensure_debounce().await;
        debug!("Sending handshake: {}", hex(auth_sequence()));

        let outcome = match timeout(self.config.write_timeout, link.write(auth_sequence())).await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "handshake write timed out after {:?}",
                self.config.write_timeout
            )),
        };

        match outcome {
            Ok(()) => {
                let now = Instant::now();
                self.session.last_write = Some(now);
                self.session.last_activity = Some(now);
                self.session.link = Some(link);
                self.session.sequence = 0;
                self.session.state = SessionState::Ready;
                info!("Session ready");
                Ok(())
            }
            Err(reason) => {
                warn!("Handshake failed: {}", reason);
                if let Err(e) = link.disconnect().await {
                    debug!("Disconnect after failed handshake also failed: {}", e);
                }
                self.session.state = SessionState::Disconnected;
                Err(Error::AuthFailed(reason))
            }
        }
    }

    /// Wait until the debounce interval since the previous write has passed.
    pub async fn ensure_debounce(&self) {
        if let Some(last) = self.session.last_write {
            let elapsed = last.elapsed();
            if elapsed < self.config.debounce {
                let remaining = self.config.debounce - elapsed;
                debug!("Debouncing write for {:?}", remaining);
                sleep(remaining).await;
            }
        }
    }

    /// Debounced write of raw bytes.
    ///
    /// Fails with [`Error::NotConnected`] unless the session is `Ready`.
    /// A transport failure tears the session down.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::NotConnected);
        }
        self.ensure_debounce().await;

        debug!("Writing {}", hex(bytes));
        self.session.last_write = Some(Instant::now());

        let Some(link) = self.session.link.as_ref() else {
            return Err(Error::NotConnected);
        };
        let result = match timeout(self.config.write_timeout, link.write(bytes)).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout("write", self.config.write_timeout)),
        };

        match result {
            Ok(()) => {
                self.session.last_activity = Some(Instant::now());
                Ok(())
            }
            Err(e) => {
                warn!("Write failed: {}", e);
                self.teardown().await;
                Err(e)
            }
        }
    }

    /// Frame `command` with the current sequence number and write it.
    ///
    /// The sequence starts at 0 for each authenticated link and advances
    /// for every frame handed to the transport, whether or not the write
    /// succeeds.
    pub async fn send_command(&mut self, command: Command) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::NotConnected);
        }
        let frame = encode_command(self.session.sequence, command);
        self.session.sequence = self.session.sequence.wrapping_add(1);
        debug!("Sending {} as seq {}", command, frame[3]);
        self.write(&frame).await
    }

    /// Collect notifications for `window`.
    ///
    /// Subscribes, optionally sends the handshake again to make the kettle
    /// replay its state, sleeps for the window, then unsubscribes. Returns
    /// [`Error::NotificationTimeout`] if nothing arrived.
    pub async fn read_notifications(&mut self, window: Duration) -> Result<Vec<Vec<u8>>> {
        if !self.is_ready() {
            return Err(Error::NotConnected);
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let handler: NotificationHandler = Arc::new(move |bytes: &[u8]| {
            let _ = tx.send(bytes.to_vec());
        });

        if let Err(e) = self.subscribe(handler).await {
            warn!("Subscribe failed: {}", e);
            self.teardown().await;
            return Err(e);
        }

        if self.config.request_state_on_poll {
            self.write(auth_sequence()).await?;
        }

        sleep(window).await;

        if let Err(e) = self.unsubscribe().await {
            warn!("Unsubscribe failed: {}", e);
            self.teardown().await;
            return Err(e);
        }

        let mut buffers = Vec::new();
        while let Ok(buffer) = rx.try_recv() {
            debug!("Notification: {}", hex(&buffer));
            buffers.push(buffer);
        }

        if buffers.is_empty() {
            self.teardown().await;
            return Err(Error::NotificationTimeout { window });
        }

        self.session.last_activity = Some(Instant::now());
        debug!("Collected {} notification(s)", buffers.len());
        Ok(buffers)
    }

    async fn subscribe(&self, handler: NotificationHandler) -> Result<()> {
        match &self.session.link {
            Some(link) => link.subscribe(handler).await,
            None => Err(Error::NotConnected),
        }
    }

    async fn unsubscribe(&self) -> Result<()> {
        match &self.session.link {
            Some(link) => link.unsubscribe().await,
            None => Err(Error::NotConnected),
        }
    }

    /// Release the link. Safe to call in any state.
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.address))]
    pub async fn disconnect(&mut self) -> Result<()> {
        self.session.state = SessionState::Disconnected;
        match self.session.link.take() {
            Some(link) => {
                info!("Disconnecting");
                link.disconnect().await
            }
            None => Ok(()),
        }
    }

    /// Best-effort disconnect used on failure paths.
    async fn teardown(&mut self) {
        if let Err(e) = self.disconnect().await {
            debug!("Disconnect during teardown failed: {}", e);
        }
    }
}
