//! Device registry - one running device per configured appliance.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::actor::{Appliance, DeviceHandle};
use crate::config::DeviceConfig;
use crate::controller::DeviceController;
use crate::error::{DeviceError, Result};
use crate::transport::Transport;

/// Running devices, looked up by name.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, DeviceHandle>,
    /// Names in configuration order
    order: Vec<String>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and start every configured device.
    ///
    /// Fails on the first invalid configuration or duplicate name; no
    /// device is started in that case.
    pub fn from_configs(configs: &[DeviceConfig], transport: Arc<dyn Transport>) -> Result<Self> {
        let mut controllers = Vec::with_capacity(configs.len());
        for config in configs {
            if controllers
                .iter()
                .any(|c: &DeviceController| c.name() == config.name)
            {
                return Err(DeviceError::Configuration(format!(
                    "duplicate device name '{}'",
                    config.name
                )));
            }
            controllers.push(DeviceController::new(config, Arc::clone(&transport))?);
        }

        let mut registry = Self::new();
        for controller in controllers {
            registry.insert(DeviceHandle::spawn(controller));
        }
        info!("Device registry started with {} devices", registry.len());
        Ok(registry)
    }

    /// Register a running device, replacing any device with the same name.
    pub fn insert(&mut self, handle: DeviceHandle) {
        let name = handle.name().to_string();
        if self.devices.insert(name.clone(), handle).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&DeviceHandle> {
        self.devices.get(name)
    }

    /// Look up a device, failing with [`DeviceError::NotFound`] when unknown.
    pub fn require(&self, name: &str) -> Result<&DeviceHandle> {
        self.get(name)
            .ok_or_else(|| DeviceError::NotFound(name.to_string()))
    }

    /// Devices in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceHandle> {
        self.order.iter().filter_map(|name| self.devices.get(name))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
