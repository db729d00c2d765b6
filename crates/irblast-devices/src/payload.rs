//! Wire payloads for blaster commands.
//!
//! A payload-bearing action is described by a [`TransmitTemplate`]: the
//! ordered list of transmit-code objects from the configuration. Every
//! dispatch renders a fresh copy of the template with `repeat` and `rdelay`
//! set on the first element; the template itself is never modified.
//!
//! Actions without a template are plain signals sent as a bare `GET`.

use serde_json::{Map, Value};
use std::time::Duration;

/// Timeout for payload-bearing `POST` commands.
pub const POST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Timeout for plain-signal `GET` commands.
pub const GET_TIMEOUT: Duration = Duration::from_millis(500);

/// Immutable transmit-code sequence for one action.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmitTemplate {
    first: Map<String, Value>,
    rest: Vec<Value>,
}

impl TransmitTemplate {
    /// Parse a configured `*_data` value.
    ///
    /// The value must be a non-empty array whose first element is an object.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let Value::Array(mut codes) = value else {
            return Err("template must be an array of transmit codes".to_string());
        };
        if codes.is_empty() {
            return Err("template must contain at least one transmit code".to_string());
        }
        match codes.remove(0) {
            Value::Object(first) => Ok(Self { first, rest: codes }),
            other => Err(format!(
                "first transmit code must be an object, got {}",
                other
            )),
        }
    }

    /// Render the JSON body for one dispatch.
    pub fn render(&self, repeat: u32, rdelay: u64) -> String {
        let mut first = self.first.clone();
        first.insert("repeat".to_string(), Value::from(repeat));
        first.insert("rdelay".to_string(), Value::from(rdelay));

        let mut codes = Vec::with_capacity(1 + self.rest.len());
        codes.push(Value::Object(first));
        codes.extend(self.rest.iter().cloned());
        Value::Array(codes).to_string()
    }
}

/// HTTP method used for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// A fully built outbound request, ready for a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    /// Headers in the order they are sent
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl OutboundRequest {
    /// Value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Build the request for one dispatch of an action.
///
/// `Content-Length` is always set explicitly on `POST`: the embedded HTTP
/// servers on common blaster firmware only match the header in its
/// capitalized form.
pub fn build_request(
    url: &str,
    template: Option<&TransmitTemplate>,
    repeat: u32,
    rdelay: u64,
) -> OutboundRequest {
    match template {
        Some(template) => {
            let body = template.render(repeat, rdelay);
            OutboundRequest {
                method: Method::Post,
                url: url.to_string(),
                headers: vec![
                    ("Content-Type", "application/json".to_string()),
                    ("Content-Length", body.len().to_string()),
                ],
                body: Some(body),
                timeout: POST_TIMEOUT,
            }
        }
        None => OutboundRequest {
            method: Method::Get,
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
            timeout: GET_TIMEOUT,
        },
    }
}
