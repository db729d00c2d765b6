//! IR-blaster device control.
//!
//! This crate drives appliances (TVs, fans, amplifiers, ...) through a
//! network IR blaster that accepts HTTP commands.
//!
//! ## Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `http` | ✅ | `reqwest` based [`HttpTransport`] |
//!
//! ## Architecture
//!
//! - **TransmitTemplate / build_request**: render the wire payload of an action
//! - **BusyGate**: rejects commands while the blaster is still transmitting
//! - **Dispatcher**: gate check, payload, and transport for one device
//! - **DeviceController**: the per-device state machine (toggle, switch, fan)
//! - **DeviceHandle**: owned-state task wrapping a controller, implementing [`Appliance`]
//! - **DeviceRegistry**: one running device per configured appliance

pub mod actor;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod payload;
pub mod registry;
pub mod transport;

pub use actor::{Appliance, DeviceHandle};
pub use config::DeviceConfig;
pub use controller::{
    step_index, DeviceController, DeviceShape, DeviceState, Effect, Intent, PendingDispatch, Step,
};
pub use dispatcher::{Action, DispatchFuture, Dispatcher};
pub use error::{DeviceError, Result};
pub use gate::BusyGate;
pub use payload::{build_request, Method, OutboundRequest, TransmitTemplate};
pub use registry::DeviceRegistry;
pub use transport::Transport;

#[cfg(feature = "http")]
pub use transport::HttpTransport;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
