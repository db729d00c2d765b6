//! Tests for DeviceRegistry

mod common;

use common::RecordingTransport;
use irblast_devices::{Appliance, DeviceConfig, DeviceError, DeviceRegistry, DeviceShape};
use serde_json::json;
use std::sync::Arc;
use tokio::test;

fn configs() -> Vec<DeviceConfig> {
    vec![
        DeviceConfig::new("tv", "http://blaster.local/tv"),
        DeviceConfig::new("amp", "http://blaster.local/json")
            .with_power_data(json!([{"code": 1}]), None),
        DeviceConfig::new("fan", "http://blaster.local/json")
            .with_power_data(json!([{"code": 2}]), None)
            .with_level_data(json!([{"code": 3}]), json!([{"code": 4}]), 3),
    ]
}

#[test]
async fn test_registry_starts_all_devices_in_order() {
    let registry =
        DeviceRegistry::from_configs(&configs(), Arc::new(RecordingTransport::new())).unwrap();

    assert_eq!(registry.len(), 3);
    let names: Vec<_> = registry.iter().map(|d| d.name().to_string()).collect();
    assert_eq!(names, vec!["tv", "amp", "fan"]);
    assert_eq!(
        registry.require("fan").unwrap().shape(),
        DeviceShape::SwitchWithLevel { steps: 3 }
    );
}

#[test]
async fn test_registry_unknown_device() {
    let registry =
        DeviceRegistry::from_configs(&configs(), Arc::new(RecordingTransport::new())).unwrap();

    assert!(registry.get("radio").is_none());
    let err = registry.require("radio").unwrap_err();
    assert!(matches!(err, DeviceError::NotFound(ref name) if name == "radio"));
}

#[test]
async fn test_registry_rejects_duplicates() {
    let mut configs = configs();
    configs.push(DeviceConfig::new("tv", "http://other.local/"));

    let err = DeviceRegistry::from_configs(&configs, Arc::new(RecordingTransport::new()))
        .unwrap_err();
    assert!(err.to_string().contains("duplicate device name 'tv'"));
}

#[test]
async fn test_registry_rejects_invalid_device() {
    let mut configs = configs();
    configs[2].steps = None;

    let err = DeviceRegistry::from_configs(&configs, Arc::new(RecordingTransport::new()))
        .unwrap_err();
    assert!(matches!(err, DeviceError::Configuration(_)));
    assert!(err.to_string().contains("fan"));
}
