//! Minimal HTTP response model.
//!
//! This struct represents a **fully buffered** HTTP response returned by the
//! network layer. It contains the final URL, status code + reason, response
//! headers, and the raw body bytes.
//!
//! ## Notes
//! - `headers` is an `http::HeaderMap`, which is **case-insensitive** for
//!   header names and keeps repeated headers such as `set-cookie`.
//! - `status_text` is derived from the status code's canonical reason phrase
//!   and may be `"Unknown"` for non-standard codes.
//!
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

/// Simple structure for HTTP responses.
///
/// All fields reflect the **received** response as-is; no additional parsing
/// or transformation is performed by this type.
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL of the response.
    pub url: url::Url,

    /// Numeric HTTP status code (e.g., `200`, `404`).
    pub status: u16,

    /// Human-readable reason phrase (e.g., `"OK"`, `"Not Found"`).
    pub status_text: String,

    /// Response headers as a case-insensitive map.
    pub headers: HeaderMap,

    /// Raw response body bytes.
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(url: url::Url, status: u16, headers: HeaderMap, body: Vec<u8>) -> Self {
        let status_text = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown")
            .to_string();

        Self {
            url,
            status,
            status_text,
            headers,
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Looks up a string at `pointer` (RFC 6901) in the JSON body.
    pub fn json_str(&self, pointer: &str) -> Option<String> {
        let value: serde_json::Value = self.json().ok()?;
        value.pointer(pointer)?.as_str().map(str::to_string)
    }
}
