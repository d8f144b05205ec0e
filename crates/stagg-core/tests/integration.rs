//! End-to-end behaviour of the kettle stack over the in-memory transport.
//!
//! All tests run on a paused tokio clock, so the 2 s notification window,
//! the 200 ms debounce and the connect backoff complete instantly while
//! still being measurable.

use std::sync::Arc;
use std::time::Duration;

use stagg_core::{
    BackoffPolicy, Error, Kettle, KettleConfig, KettleManager, MockTransport, SessionConfig,
    SessionState, TemperatureUnit,
};
use stagg_core::codec::{decode_notifications, encode_command};
use stagg_types::{Command, DeviceAddress};
use tokio::time::Instant;

fn address() -> DeviceAddress {
    DeviceAddress::new("C4:AB:12:34:56:78").unwrap()
}

fn state_burst(power: u8, current: u8) -> Vec<Vec<u8>> {
    vec![
        vec![0xEF, 0xDD, 0x00],
        vec![power],
        vec![0xEF, 0xDD, 0x01],
        vec![0],
        vec![0xEF, 0xDD, 0x02],
        vec![205, 1],
        vec![0xEF, 0xDD, 0x03],
        vec![current, 1],
        vec![0xEF, 0xDD, 0x08],
        vec![1],
    ]
}

fn setup() -> (Arc<MockTransport>, Kettle<MockTransport>) {
    let transport = Arc::new(MockTransport::new());
    let kettle = Kettle::new(Arc::clone(&transport), address());
    (transport, kettle)
}

#[tokio::test(start_paused = true)]
async fn poll_returns_decoded_state() {
    let (transport, kettle) = setup();
    transport.set_notifications(state_burst(1, 172));

    let started = Instant::now();
    let state = kettle.poll().await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(state.power, Some(true));
    assert_eq!(state.hold, Some(false));
    assert_eq!(state.target_temperature, Some(205));
    assert_eq!(state.current_temperature, Some(172));
    assert_eq!(state.temperature_unit, Some(TemperatureUnit::Fahrenheit));
    assert_eq!(state.lifted, Some(false));
    assert_eq!(state.countdown_seconds, None);
}

#[tokio::test(start_paused = true)]
async fn failed_poll_returns_cached_state() {
    let (transport, kettle) = setup();
    transport.set_notifications(state_burst(1, 172));
    let good = kettle.poll().await.unwrap();

    transport.clear_notifications();
    let fallback = kettle.poll().await.unwrap();
    assert_eq!(fallback, good);

    // The failed poll dropped the link; the next one reconnects.
    transport.set_notifications(state_burst(0, 180));
    let fresh = kettle.poll().await.unwrap();
    assert_eq!(fresh.power, Some(false));
    assert_eq!(fresh.current_temperature, Some(180));
    assert_eq!(transport.connect_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn polled_state_serializes_without_missing_fields() {
    let (transport, kettle) = setup();
    transport.set_notifications(vec![vec![0xEF, 0xDD, 0x00], vec![0]]);
    let state = kettle.poll().await.unwrap();

    let json = serde_json::to_string(&state).unwrap();
    assert_eq!(json, r#"{"power":false}"#);
    let parsed: stagg_core::DeviceState = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, state);
}

#[tokio::test(start_paused = true)]
async fn first_poll_without_cache_surfaces_error() {
    let (_transport, kettle) = setup();
    match kettle.poll().await {
        Err(Error::NotificationTimeout { window }) => assert_eq!(window, Duration::from_secs(2)),
        other => panic!("expected NotificationTimeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn back_to_back_writes_are_debounced() {
    let (transport, kettle) = setup();

    kettle.set_power(true).await.unwrap();
    kettle
        .set_temperature(200, TemperatureUnit::Fahrenheit)
        .await
        .unwrap();
    kettle.set_power(false).await.unwrap();

    let instants = transport.write_instants();
    assert_eq!(instants.len(), 4, "handshake plus three commands");
    for pair in instants.windows(2) {
        assert!(
            pair[1] - pair[0] >= Duration::from_millis(200),
            "writes {:?} apart",
            pair[1] - pair[0]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn connect_backoff_doubles_and_stops_after_three_attempts() {
    let (transport, kettle) = setup();
    transport.fail_connects(u32::MAX);

    let err = kettle.set_power(true).await.unwrap_err();
    match err {
        Error::ConnectMaxAttemptsExceeded { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected ConnectMaxAttemptsExceeded, got {other:?}"),
    }

    let instants = transport.connect_instants();
    assert_eq!(instants.len(), 3, "no fourth transport connect");
    assert_eq!(instants[1] - instants[0], Duration::from_secs(2));
    assert_eq!(instants[2] - instants[1], Duration::from_secs(4));

    // The attempt counter was reset, so the next call gets three fresh tries.
    transport.fail_connects(2);
    kettle.set_power(true).await.unwrap();
    assert_eq!(transport.connect_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn custom_backoff_policy_is_honoured() {
    let transport = Arc::new(MockTransport::new());
    let config = KettleConfig::default().session(
        SessionConfig::default().backoff(
            BackoffPolicy::new(2)
                .initial_delay(Duration::from_millis(500))
                .max_delay(Duration::from_secs(1)),
        ),
    );
    let kettle = Kettle::with_config(Arc::clone(&transport), address(), config).unwrap();
    transport.fail_connects(u32::MAX);

    assert!(kettle.set_power(true).await.is_err());
    let instants = transport.connect_instants();
    assert_eq!(instants.len(), 2);
    assert_eq!(instants[1] - instants[0], Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn connect_timeout_counts_as_failed_attempt() {
    let (transport, kettle) = setup();
    transport.set_connect_latency(Duration::from_secs(60));

    let started = Instant::now();
    let err = kettle.set_power(true).await.unwrap_err();
    assert!(matches!(err, Error::ConnectMaxAttemptsExceeded { .. }));
    // Three 15 s timeouts plus 2 s and 4 s of backoff.
    assert_eq!(started.elapsed(), Duration::from_secs(51));
}

#[tokio::test(start_paused = true)]
async fn temperature_requests_are_clamped() {
    let (transport, kettle) = setup();

    kettle
        .set_temperature(400, TemperatureUnit::Fahrenheit)
        .await
        .unwrap();
    kettle
        .set_temperature(10, TemperatureUnit::Celsius)
        .await
        .unwrap();
    kettle
        .set_temperature(-5, TemperatureUnit::Fahrenheit)
        .await
        .unwrap();

    let values: Vec<u8> = transport.command_frames().iter().map(|f| f[5]).collect();
    assert_eq!(values, vec![212, 40, 104]);
}

#[tokio::test(start_paused = true)]
async fn sequence_numbers_increase_across_command_kinds() {
    let (transport, kettle) = setup();

    kettle.set_power(true).await.unwrap();
    kettle
        .set_temperature(93, TemperatureUnit::Celsius)
        .await
        .unwrap();
    kettle.set_power(false).await.unwrap();

    let frames = transport.command_frames();
    assert_eq!(frames[0], encode_command(0, Command::power(true)).to_vec());
    assert_eq!(
        frames[1],
        encode_command(1, Command::target_temperature(93, TemperatureUnit::Celsius)).to_vec()
    );
    assert_eq!(frames[2], encode_command(2, Command::power(false)).to_vec());
}

#[tokio::test(start_paused = true)]
async fn sequence_restarts_after_disconnect() {
    let (transport, kettle) = setup();

    kettle.set_power(true).await.unwrap();
    kettle.disconnect().await.unwrap();
    kettle.set_power(false).await.unwrap();

    let sequences: Vec<u8> = transport.command_frames().iter().map(|f| f[3]).collect();
    assert_eq!(sequences, vec![0, 0]);
    assert_eq!(transport.connect_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn per_operation_writes_stay_debounced_across_reconnects() {
    let transport = Arc::new(MockTransport::new());
    transport.set_notifications(state_burst(1, 150));
    let kettle =
        Kettle::with_config(Arc::clone(&transport), address(), KettleConfig::per_operation())
            .unwrap();

    kettle.set_power(true).await.unwrap();
    kettle.poll().await.unwrap();

    assert_eq!(transport.connect_count(), 2);
    let instants = transport.write_instants();
    // Handshake, power frame, handshake, state request.
    assert_eq!(instants.len(), 4);
    for pair in instants.windows(2) {
        assert!(
            pair[1] - pair[0] >= Duration::from_millis(200),
            "writes {:?} apart",
            pair[1] - pair[0]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn power_command_round_trips_through_decoder() {
    let frame = encode_command(0, Command::power(true));
    let state = decode_notifications(&[vec![0xEF, 0xDD, frame[4]], vec![frame[5]]]);
    assert_eq!(state.power, Some(true));
}

#[tokio::test(start_paused = true)]
async fn unreachable_kettle_is_no_device_and_not_retried() {
    let (transport, kettle) = setup();
    transport.set_reachable(false);

    assert!(matches!(
        kettle.set_power(true).await,
        Err(Error::NoDevice { .. })
    ));
    assert_eq!(transport.connect_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn handshake_failure_is_auth_failed() {
    let (transport, kettle) = setup();
    transport.fail_writes(1);

    assert!(matches!(
        kettle.set_power(true).await,
        Err(Error::AuthFailed(_))
    ));
    assert_eq!(transport.connect_count(), 1);
    assert_eq!(kettle.session_state().await, SessionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn dropped_link_is_detected_and_rebuilt() {
    let (transport, kettle) = setup();
    transport.set_notifications(state_burst(1, 150));
    kettle.poll().await.unwrap();

    transport.drop_link();
    kettle.poll().await.unwrap();
    assert_eq!(transport.connect_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_calls_on_one_kettle_do_not_interleave() {
    let transport = Arc::new(MockTransport::new());
    transport.set_notifications(state_burst(1, 150));
    let kettle = Arc::new(Kettle::new(Arc::clone(&transport), address()));

    let a = {
        let kettle = Arc::clone(&kettle);
        tokio::spawn(async move { kettle.poll().await })
    };
    let b = {
        let kettle = Arc::clone(&kettle);
        tokio::spawn(async move { kettle.set_power(false).await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(transport.connect_count(), 1);
    for pair in transport.write_instants().windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(200));
    }
}

#[tokio::test(start_paused = true)]
async fn manager_keeps_addresses_independent() {
    let transport = Arc::new(MockTransport::new());
    transport.set_notifications(state_burst(1, 150));
    let manager = KettleManager::new(Arc::clone(&transport));
    let kitchen = DeviceAddress::new("C4:AB:12:34:56:01").unwrap();
    let office = DeviceAddress::new("C4:AB:12:34:56:02").unwrap();

    let (kitchen_state, office_state) =
        tokio::join!(manager.poll(&kitchen), manager.poll(&office));
    assert!(kitchen_state.is_ok());
    assert!(office_state.is_ok());
    assert_eq!(transport.connect_count(), 2);

    manager.disconnect_all().await.unwrap();
    assert_eq!(transport.disconnect_count(), 2);
}
