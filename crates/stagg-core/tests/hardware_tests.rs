//! Hardware tests for stagg-core.
//!
//! These tests need a real kettle in range and are ignored by default:
//! ```
//! STAGG_DEVICE="AA:BB:CC:DD:EE:FF" cargo test --package stagg-core --test hardware_tests -- --ignored --nocapture
//! ```
//!
//! The heater is never switched on; only target temperature and "off"
//! commands are sent.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use stagg_core::{BleTransport, Kettle, KettleConfig, TemperatureUnit};
use stagg_types::DeviceAddress;
use tokio::time::timeout;

/// Upper bound for any single hardware operation, including connect retries.
const BLE_TIMEOUT: Duration = Duration::from_secs(60);

fn device_address() -> Option<DeviceAddress> {
    env::var("STAGG_DEVICE")
        .ok()
        .filter(|s| !s.is_empty())
        .and_then(|s| DeviceAddress::new(s).ok())
}

async fn kettle(config: KettleConfig) -> Option<Kettle<BleTransport>> {
    let Some(address) = device_address() else {
        println!("STAGG_DEVICE not set, skipping");
        return None;
    };
    let transport = BleTransport::new().await.expect("no Bluetooth adapter");
    Some(Kettle::with_config(Arc::new(transport), address, config).expect("valid config"))
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_poll_state() {
    let Some(kettle) = kettle(KettleConfig::default()).await else {
        return;
    };

    let state = timeout(BLE_TIMEOUT, kettle.poll())
        .await
        .expect("poll timed out")
        .expect("poll failed");
    println!("State: {}", state);
    assert!(!state.is_empty());

    kettle.disconnect().await.unwrap();
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_set_temperature_then_refresh() {
    let Some(kettle) = kettle(KettleConfig::default()).await else {
        return;
    };

    timeout(
        BLE_TIMEOUT,
        kettle.set_temperature(200, TemperatureUnit::Fahrenheit),
    )
    .await
    .expect("command timed out")
    .expect("command failed");

    let state = timeout(BLE_TIMEOUT, kettle.refresh_after_settle())
        .await
        .expect("refresh timed out")
        .expect("refresh failed");
    println!("After set-temp: {}", state);

    kettle.disconnect().await.unwrap();
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_per_operation_session() {
    let Some(kettle) = kettle(KettleConfig::per_operation()).await else {
        return;
    };

    timeout(BLE_TIMEOUT, kettle.set_power(false))
        .await
        .expect("command timed out")
        .expect("command failed");
    let state = timeout(BLE_TIMEOUT, kettle.poll())
        .await
        .expect("poll timed out")
        .expect("poll failed");
    assert_eq!(state.power, Some(false));
}
