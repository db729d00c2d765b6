//! Device task behaviour: concurrent intents, auto-reset, notifications.

mod common;

use common::RecordingTransport;
use irblast_devices::{Appliance, DeviceConfig, DeviceController, DeviceHandle, DeviceShape};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const MS: Duration = Duration::from_millis(1);

fn spawn(config: &DeviceConfig, transport: &Arc<RecordingTransport>) -> DeviceHandle {
    let controller = DeviceController::new(config, transport.clone()).unwrap();
    DeviceHandle::spawn(controller)
}

#[tokio::test(start_paused = true)]
async fn test_toggle_second_turn_on_is_busy() {
    let transport = Arc::new(RecordingTransport::new());
    let config = DeviceConfig::new("tv", "http://blaster.local/tv").with_busy(300, 1, 1, 1);
    let tv = spawn(&config, &transport);
    tokio::time::advance(MS).await;

    tv.set_power(true).await.unwrap();
    assert!(tv.power());

    let err = tv.set_power(true).await.unwrap_err();
    assert!(err.is_busy());
    assert_eq!(transport.count(), 1);
    assert!(transport.requests()[0].body.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_momentary_toggle_resets_after_on_busy() {
    let transport = Arc::new(RecordingTransport::new());
    let config = DeviceConfig::new("tv", "http://blaster.local/tv").with_busy(300, 1, 1, 1);
    let tv = spawn(&config, &transport);
    let mut states = tv.subscribe();
    tokio::time::advance(MS).await;

    tv.set_power(true).await.unwrap();
    assert!(tv.power());
    states.borrow_and_update();

    states.changed().await.unwrap();
    assert!(!states.borrow().power);

    // The busy window has passed by the time the reset fires.
    tokio::time::advance(MS).await;
    tv.set_power(true).await.unwrap();
    assert_eq!(transport.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stateful_toggle_stays_on() {
    let transport = Arc::new(RecordingTransport::new());
    let mut config = DeviceConfig::new("tv", "http://blaster.local/tv").with_busy(50, 1, 1, 1);
    config.stateful = true;
    let tv = spawn(&config, &transport);
    assert_eq!(tv.shape(), DeviceShape::Toggle { momentary: false });
    tokio::time::advance(MS).await;

    tv.set_power(true).await.unwrap();
    tokio::time::sleep(MS * 500).await;
    assert!(tv.power());

    tv.set_power(false).await.unwrap();
    assert!(!tv.power());
    assert_eq!(transport.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_intents_only_one_wins() {
    let transport = Arc::new(RecordingTransport::delayed(MS * 100));
    let config = DeviceConfig::new("amp", "http://blaster.local/json")
        .with_power_data(json!([{"code": 1}]), Some(json!([{"code": 2}])));
    let amp = spawn(&config, &transport);
    tokio::time::advance(MS).await;

    let (first, second) = tokio::join!(amp.set_power(true), amp.set_power(true));

    assert_eq!(
        [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
        1
    );
    let loser = first.err().or(second.err()).unwrap();
    assert!(loser.is_busy());
    assert_eq!(transport.count(), 1);
    assert!(amp.power());
}

#[tokio::test(start_paused = true)]
async fn test_intent_decided_while_dispatch_in_flight() {
    let transport = Arc::new(RecordingTransport::delayed(MS * 100));
    let config = DeviceConfig::new("fan", "http://blaster.local/json")
        .with_power_data(json!([{"code": "on"}]), None)
        .with_level_data(json!([{"code": "up"}]), json!([{"code": "down"}]), 4)
        .with_busy(10, 10, 10, 10);
    let fan = spawn(&config, &transport);
    tokio::time::advance(MS).await;

    let on = {
        let fan = fan.clone();
        tokio::spawn(async move { fan.set_power(true).await })
    };
    tokio::time::sleep(MS * 20).await;

    // The "on" request is still in flight, but its busy window is over.
    assert!(!fan.power());
    fan.set_level(50).await.unwrap();

    on.await.unwrap().unwrap();
    assert!(fan.power());
    assert_eq!(fan.level(), 50);
    assert_eq!(transport.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_see_level_changes() {
    let transport = Arc::new(RecordingTransport::new());
    let config = DeviceConfig::new("fan", "http://blaster.local/json")
        .with_power_data(json!([{"code": "on"}]), None)
        .with_level_data(json!([{"code": "up"}]), json!([{"code": "down"}]), 10)
        .with_start(20);
    let fan = spawn(&config, &transport);
    let mut states = fan.subscribe();
    assert_eq!(states.borrow_and_update().level, 20);
    tokio::time::advance(MS).await;

    fan.set_level(60).await.unwrap();

    assert!(states.has_changed().unwrap());
    let state = states.borrow_and_update().clone();
    assert_eq!(state.level, 60);
    assert!(state.updated_at.is_some());
    assert_eq!(fan.state(), state);
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_is_reported_to_caller() {
    let transport = Arc::new(RecordingTransport::failing());
    let config = DeviceConfig::new("amp", "http://blaster.local/json")
        .with_power_data(json!([{"code": 1}]), None);
    let amp = spawn(&config, &transport);
    let states = amp.subscribe();
    tokio::time::advance(MS).await;

    let err = amp.set_power(true).await.unwrap_err();
    assert!(matches!(err, irblast_devices::DeviceError::Transport(_)));
    assert!(!amp.power());
    assert!(!states.has_changed().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_level_on_switch_is_unsupported() {
    let transport = Arc::new(RecordingTransport::new());
    let config = DeviceConfig::new("amp", "http://blaster.local/json")
        .with_power_data(json!([{"code": 1}]), None);
    let amp = spawn(&config, &transport);

    let err = amp.set_level(40).await.unwrap_err();
    assert!(matches!(err, irblast_devices::DeviceError::Unsupported(_)));
}

#[tokio::test(start_paused = true)]
async fn test_oversized_busy_window_keeps_device_running() {
    let transport = Arc::new(RecordingTransport::new());
    let config = DeviceConfig::new("fan", "http://blaster.local/json")
        .with_power_data(json!([{"code": 1}]), None)
        .with_level_data(json!([{"code": 2}]), json!([{"code": 3}]), 100_000)
        .with_busy(1, 1, u64::MAX, 1);
    config.validate().unwrap();
    let fan = spawn(&config, &transport);
    tokio::time::advance(MS).await;

    fan.set_level(100).await.unwrap();
    assert_eq!(fan.level(), 100);

    // The device task is still alive and the window is simply very long.
    let err = fan.set_level(0).await.unwrap_err();
    assert!(err.is_busy());
    assert_eq!(transport.count(), 1);
}
