//! Shared test doubles.

#![allow(dead_code)]

use async_trait::async_trait;
use irblast_devices::{DeviceError, OutboundRequest, Result, Transport};
use std::sync::Mutex;
use std::time::Duration;

/// Transport that records every request and answers with a fixed outcome.
#[derive(Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<OutboundRequest>>,
    delay: Option<Duration>,
    fail: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request fails with a transport error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every request takes `delay` before answering.
    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Bodies of the recorded requests, `None` for plain signals.
    pub fn bodies(&self) -> Vec<Option<String>> {
        self.requests().into_iter().map(|r| r.body).collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn execute(&self, request: OutboundRequest) -> Result<u16> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            Err(DeviceError::Transport("connection refused".to_string()))
        } else {
            Ok(200)
        }
    }
}
