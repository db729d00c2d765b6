//! Transports carrying commands to the blaster endpoint.
//!
//! The [`Transport`] trait is the only place where a dispatch suspends.
//! [`HttpTransport`] is the production implementation built on `reqwest`;
//! tests substitute an in-memory recorder.

use async_trait::async_trait;

use crate::error::Result;
use crate::payload::OutboundRequest;

/// Something that can deliver an [`OutboundRequest`].
///
/// Returns the HTTP status of any response received. Network failures and
/// timeouts are reported as [`DeviceError::Transport`](crate::DeviceError::Transport).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: OutboundRequest) -> Result<u16>;
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use super::*;
    use crate::error::DeviceError;
    use crate::payload::Method;
    use reqwest::Client;
    use tracing::debug;

    /// `reqwest` based transport.
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        client: Client,
    }

    impl HttpTransport {
        pub fn new() -> Self {
            // Blaster firmware handles one connection at a time and matches
            // header names case-sensitively.
            let client = Client::builder()
                .pool_max_idle_per_host(0)
                .http1_title_case_headers()
                .build()
                .unwrap_or_default();
            Self { client }
        }

        pub fn with_client(client: Client) -> Self {
            Self { client }
        }
    }

    impl Default for HttpTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl Transport for HttpTransport {
        async fn execute(&self, request: OutboundRequest) -> Result<u16> {
            let mut builder = match request.method {
                Method::Get => self.client.get(&request.url),
                Method::Post => self.client.post(&request.url),
            };
            builder = builder.timeout(request.timeout);
            for (key, value) in &request.headers {
                builder = builder.header(*key, value);
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    DeviceError::Transport(format!(
                        "{} {} timed out after {}ms",
                        request.method.as_str(),
                        request.url,
                        request.timeout.as_millis()
                    ))
                } else {
                    DeviceError::Transport(format!("HTTP request failed: {}", e))
                }
            })?;

            let status = response.status();
            debug!(
                url = %request.url,
                status = status.as_u16(),
                reason = status.canonical_reason().unwrap_or(""),
                "Blaster response"
            );
            Ok(status.as_u16())
        }
    }
}
