//! Error type shared by every layer of the device stack.

/// Errors that can occur while configuring or driving an IR-blaster device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The busy window of a previous command has not elapsed yet
    #[error("Device busy: {0}")]
    Busy(String),

    /// Network failure or timeout talking to the blaster endpoint
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid device configuration, detected at construction
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No device with that name is registered
    #[error("Device not found: {0}")]
    NotFound(String),

    /// The device shape does not support the requested intent
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Requested level is outside 0-100
    #[error("Invalid level: {0} (expected 0-100)")]
    InvalidLevel(u8),

    /// The device task is no longer running
    #[error("Device task stopped")]
    Stopped,
}

impl DeviceError {
    /// Whether the error came from the admission gate rather than the network.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Result type for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;
