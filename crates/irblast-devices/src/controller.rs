//! Device state machine.
//!
//! A [`DeviceController`] turns high-level intents ("turn on", "set level to
//! 70%") into blaster commands and keeps the reported state of the appliance.
//! What it can do depends on its [`DeviceShape`], fixed at construction:
//!
//! | Shape | Configured actions | Intents |
//! |-------|--------------------|---------|
//! | `Toggle` | none (bare signal) | power on fires the toggle, power off is local only |
//! | `Switch` | `on_data` (+ optional `off_data`) | power on/off |
//! | `SwitchWithLevel` | on/off + `up_data`/`down_data` + `steps` | power on/off, level |
//!
//! Handling is split in two so that callers never suspend while deciding:
//! [`DeviceController::handle_at`] decides synchronously (including the busy
//! gate check) and returns the pending dispatch, and
//! [`DeviceController::complete`] applies its outcome. Reported state only
//! changes in `complete`, and only on success.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::dispatcher::{Action, DispatchFuture, Dispatcher};
use crate::error::{DeviceError, Result};
use crate::transport::Transport;

/// The closed set of device variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DeviceShape {
    /// Single toggle signal. `momentary` devices report "off" again once
    /// the toggle's busy window has passed.
    Toggle { momentary: bool },
    /// Separate on and off commands.
    Switch,
    /// On/off plus stepwise up/down level control.
    SwitchWithLevel { steps: u32 },
}

impl DeviceShape {
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceShape::Toggle { .. } => "toggle",
            DeviceShape::Switch => "switch",
            DeviceShape::SwitchWithLevel { .. } => "fan",
        }
    }

    pub fn has_level(&self) -> bool {
        matches!(self, DeviceShape::SwitchWithLevel { .. })
    }
}

/// A request from the accessory layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    SetPower(bool),
    SetLevel(u8),
}

/// State change applied when a dispatch succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Toggled,
    PowerOn,
    PowerOff,
    Level(u8),
}

/// A dispatch whose gate check has passed (or failed) but whose outcome is
/// still to be awaited.
pub struct PendingDispatch {
    pub action: Action,
    pub effect: Effect,
    pub future: DispatchFuture,
}

impl std::fmt::Debug for PendingDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingDispatch")
            .field("action", &self.action)
            .field("effect", &self.effect)
            .finish_non_exhaustive()
    }
}

/// Result of deciding an intent.
#[derive(Debug)]
pub enum Step {
    /// Nothing to send; the intent already succeeded.
    Done,
    /// A command was issued; feed its outcome to [`DeviceController::complete`].
    Pending(PendingDispatch),
}

/// Reported state of an appliance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub power: bool,
    /// Level in percent, meaningful for level-capable devices
    pub level: u8,
    /// Last time the reported state changed
    pub updated_at: Option<DateTime<Utc>>,
}

/// Discretized level position, as exact integer floor division of `percent * steps` by 100.
pub fn step_index(percent: u8, steps: u32) -> i64 {
    i64::from(percent) * i64::from(steps) / 100
}

/// State machine for one IR-blaster controlled appliance.
#[derive(Debug)]
pub struct DeviceController {
    name: String,
    shape: DeviceShape,
    start: Option<u8>,
    on_busy: Duration,
    state: DeviceState,
    dispatcher: Dispatcher,
}

impl DeviceController {
    /// Validate `config` and build a controller.
    pub fn new(config: &DeviceConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::new_at(config, transport, Instant::now())
    }

    /// Like [`new`](Self::new), with an explicit construction instant for the busy gate.
    pub fn new_at(config: &DeviceConfig, transport: Arc<dyn Transport>, now: Instant) -> Result<Self> {
        let shape = config.validate()?;
        let dispatcher = Dispatcher::new(config, transport, now)?;
        debug!(device = %config.name, kind = shape.kind(), "Created device controller");

        Ok(Self {
            name: config.name.clone(),
            shape,
            start: config.start,
            on_busy: Duration::from_millis(config.on_busy),
            state: DeviceState {
                power: false,
                level: config.start.unwrap_or(0),
                updated_at: None,
            },
            dispatcher,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> DeviceShape {
        self.shape
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn power(&self) -> bool {
        self.state.power
    }

    pub fn level(&self) -> u8 {
        self.state.level
    }

    pub fn busy_until(&self) -> Instant {
        self.dispatcher.busy_until()
    }

    /// How long after a successful toggle the reported power falls back to
    /// off, for momentary toggle devices.
    pub fn auto_reset_after(&self) -> Option<Duration> {
        match self.shape {
            DeviceShape::Toggle { momentary: true } => Some(self.on_busy),
            _ => None,
        }
    }

    /// Decide an intent using the current instant.
    pub fn handle(&mut self, intent: Intent) -> Result<Step> {
        self.handle_at(intent, Instant::now())
    }

    /// Decide an intent at `now`.
    ///
    /// Never suspends. Returns [`Step::Done`] when nothing needs to be sent,
    /// or the pending dispatch otherwise. A dispatch rejected by the busy
    /// gate is still returned as pending; its future resolves to
    /// [`DeviceError::Busy`].
    pub fn handle_at(&mut self, intent: Intent, now: Instant) -> Result<Step> {
        match intent {
            Intent::SetPower(on) => self.set_power(on, now),
            Intent::SetLevel(level) => self.set_level(level, now),
        }
    }

    fn set_power(&mut self, on: bool, now: Instant) -> Result<Step> {
        info!(device = %self.name, on, "Setting power");

        if let DeviceShape::Toggle { .. } = self.shape {
            if !on {
                // Turning a toggle device off is purely local.
                self.update(|state| state.power = false);
                return Ok(Step::Done);
            }
            return Ok(self.dispatch(Action::Toggle, 1, Effect::Toggled, now));
        }

        match (on, self.state.power) {
            (true, false) => Ok(self.dispatch(Action::On, 1, Effect::PowerOn, now)),
            (false, true) => Ok(self.dispatch(Action::Off, 1, Effect::PowerOff, now)),
            _ => {
                debug!(device = %self.name, on, "Power already in requested state");
                Ok(Step::Done)
            }
        }
    }

    fn set_level(&mut self, target: u8, now: Instant) -> Result<Step> {
        let DeviceShape::SwitchWithLevel { steps } = self.shape else {
            return Err(DeviceError::Unsupported(format!(
                "{} ({}) has no level control",
                self.name,
                self.shape.kind()
            )));
        };
        if target > 100 {
            return Err(DeviceError::InvalidLevel(target));
        }

        let current = self.state.level;
        let delta = step_index(target, steps) - step_index(current, steps);
        debug!(device = %self.name, target, current, delta, "Computed level delta");

        if delta < 0 {
            info!(device = %self.name, by = -delta, "Turning down");
            Ok(self.dispatch(Action::Down, delta.unsigned_abs() as u32, Effect::Level(target), now))
        } else if delta > 0 {
            info!(device = %self.name, by = delta, "Turning up");
            Ok(self.dispatch(Action::Up, delta as u32, Effect::Level(target), now))
        } else {
            debug!(device = %self.name, target, current, "Level unchanged, not controlling");
            Ok(Step::Done)
        }
    }

    fn dispatch(&mut self, action: Action, repeat: u32, effect: Effect, now: Instant) -> Step {
        Step::Pending(PendingDispatch {
            action,
            effect,
            future: self.dispatcher.send_at(action, repeat, now),
        })
    }

    /// Apply the outcome of a dispatch.
    ///
    /// Success applies `effect` to the reported state; failure leaves the
    /// state untouched and is returned to the caller.
    pub fn complete(&mut self, effect: Effect, outcome: Result<u16>) -> Result<()> {
        if let Err(e) = outcome {
            warn!(device = %self.name, effect = ?effect, "IR blast failed: {}", e);
            return Err(e);
        }
        info!(device = %self.name, effect = ?effect, "IR blast succeeded");

        let start = self.start;
        match effect {
            Effect::Toggled => self.update(|state| state.power = true),
            Effect::PowerOn => self.update(|state| {
                state.power = true;
                if let Some(start) = start {
                    state.level = start;
                }
            }),
            Effect::PowerOff => self.update(|state| state.power = false),
            Effect::Level(level) => self.update(|state| state.level = level),
        }
        Ok(())
    }

    /// Report a momentary toggle device as off again.
    pub fn reset_momentary(&mut self) {
        if self.auto_reset_after().is_some() {
            debug!(device = %self.name, "Momentary toggle reset");
            self.update(|state| state.power = false);
        }
    }

    /// Decide an intent and await its dispatch in one go.
    ///
    /// Intents applied this way are serialized by `&mut self`; use the
    /// device actor for concurrent callers.
    pub async fn apply(&mut self, intent: Intent) -> Result<()> {
        match self.handle(intent)? {
            Step::Done => Ok(()),
            Step::Pending(PendingDispatch { effect, future, .. }) => {
                let outcome = future.await;
                self.complete(effect, outcome)
            }
        }
    }

    fn update(&mut self, change: impl FnOnce(&mut DeviceState)) {
        let before = (self.state.power, self.state.level);
        change(&mut self.state);
        if before != (self.state.power, self.state.level) {
            self.state.updated_at = Some(Utc::now());
        }
    }
}
