//! Command dispatch.
//!
//! The [`Dispatcher`] owns the device's [`BusyGate`] and its command table.
//! [`Dispatcher::send`] performs the gate check and builds the request
//! synchronously, then hands back a future that only has to deliver it.
//! Nothing suspends between checking the gate and advancing it.

use futures::future::{self, BoxFuture, FutureExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::config::DeviceConfig;
use crate::error::{DeviceError, Result};
use crate::gate::BusyGate;
use crate::payload::{build_request, TransmitTemplate};
use crate::transport::Transport;

/// A logical blaster action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Toggle,
    On,
    Off,
    Up,
    Down,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Toggle => "toggle",
            Action::On => "on",
            Action::Off => "off",
            Action::Up => "up",
            Action::Down => "down",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Future resolving to the outcome of one dispatch: the HTTP status on success.
pub type DispatchFuture = BoxFuture<'static, Result<u16>>;

/// Template and busy window of one action.
#[derive(Debug, Clone)]
struct CommandSpec {
    template: Option<TransmitTemplate>,
    busy: Duration,
}

/// Sends blaster commands for a single device.
pub struct Dispatcher {
    name: String,
    url: String,
    rdelay: u64,
    gate: BusyGate,
    toggle: CommandSpec,
    on: CommandSpec,
    off: CommandSpec,
    up: CommandSpec,
    down: CommandSpec,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    /// Build a dispatcher from a device configuration.
    ///
    /// The gate starts busy up to `now`.
    pub fn new(config: &DeviceConfig, transport: Arc<dyn Transport>, now: Instant) -> Result<Self> {
        let spec = |key: &str, data: &Option<serde_json::Value>, busy: u64| -> Result<CommandSpec> {
            Ok(CommandSpec {
                template: config.template(key, data)?,
                busy: Duration::from_millis(busy),
            })
        };

        Ok(Self {
            name: config.name.clone(),
            url: config.url.clone(),
            rdelay: config.rdelay,
            gate: BusyGate::new(now),
            // The toggle is always a bare signal, paced by the "on" window.
            toggle: spec("toggle", &None, config.on_busy)?,
            on: spec("on_data", &config.on_data, config.on_busy)?,
            off: spec("off_data", &config.off_data, config.off_busy)?,
            up: spec("up_data", &config.up_data, config.up_busy)?,
            down: spec("down_data", &config.down_data, config.down_busy)?,
            transport,
        })
    }

    fn command(&self, action: Action) -> &CommandSpec {
        match action {
            Action::Toggle => &self.toggle,
            Action::On => &self.on,
            Action::Off => &self.off,
            Action::Up => &self.up,
            Action::Down => &self.down,
        }
    }

    /// Dispatch `action` with `repeat` IR repeats, checking the gate at `now`.
    ///
    /// When the gate rejects, the returned future resolves immediately to
    /// [`DeviceError::Busy`] and nothing is sent.
    pub fn send_at(&mut self, action: Action, repeat: u32, now: Instant) -> DispatchFuture {
        let busy = self.command(action).busy;
        if !self.gate.try_acquire(now, busy, repeat) {
            debug!(device = %self.name, action = %action, "Blaster is busy, rejecting command");
            return future::ready(Err(DeviceError::Busy(self.name.clone()))).boxed();
        }

        let request = build_request(
            &self.url,
            self.command(action).template.as_ref(),
            repeat,
            self.rdelay,
        );
        debug!(
            device = %self.name,
            action = %action,
            repeat,
            method = request.method.as_str(),
            url = %request.url,
            "Sending blaster command"
        );

        let transport = Arc::clone(&self.transport);
        async move { transport.execute(request).await }.boxed()
    }

    /// [`send_at`](Self::send_at) using the current instant.
    pub fn send(&mut self, action: Action, repeat: u32) -> DispatchFuture {
        self.send_at(action, repeat, Instant::now())
    }

    pub fn busy_until(&self) -> Instant {
        self.gate.busy_until()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("busy_until", &self.gate.busy_until())
            .finish()
    }
}
