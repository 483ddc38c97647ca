//! Per-call records that make up the diagnostic trail.

use crate::errors::NetworkError;
use crate::net::Response;
use http::header::SET_COOKIE;
use http::{HeaderMap, Method};
use time::OffsetDateTime;
use url::Url;

pub const HEADER_BACKEND_POOL: &str = "x-backend-pool";
pub const HEADER_SESSION_ID: &str = "x-session-id";
pub const HEADER_REQUEST_ID: &str = "x-request-id";
pub const HEADER_REGION: &str = "x-ms-region";
pub const HEADER_ROUTING_DECISION: &str = "x-routing-decision";

/// Stored when backend-pool, region or routing-decision is absent.
pub const SENTINEL_UNKNOWN: &str = "unknown";
/// Stored when session id or request id is absent.
pub const SENTINEL_NONE: &str = "none";

/// What was sent. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    pub timestamp: OffsetDateTime,
    pub method: Method,
    pub url: Url,
    /// The `Cookie` header actually sent, if any.
    pub cookie: Option<String>,
}

/// Routing metadata captured from a response's headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRecord {
    pub status: u16,
    /// Raw `Set-Cookie` values in the order received.
    pub set_cookies: Vec<String>,
    pub backend_pool: String,
    pub session_id: String,
    pub request_id: String,
    pub region: String,
    pub routing_decision: String,
    missing: Vec<&'static str>,
}

impl ResponseRecord {
    pub fn from_response(response: &Response) -> Self {
        Self::from_headers(response.status, &response.headers)
    }

    pub fn from_headers(status: u16, headers: &HeaderMap) -> Self {
        let mut missing = Vec::new();
        let mut field = |name: &'static str, sentinel: &str| match header_str(headers, name) {
            Some(v) => v,
            None => {
                missing.push(name);
                sentinel.to_string()
            }
        };

        let backend_pool = field(HEADER_BACKEND_POOL, SENTINEL_UNKNOWN);
        let session_id = field(HEADER_SESSION_ID, SENTINEL_NONE);
        let request_id = field(HEADER_REQUEST_ID, SENTINEL_NONE);
        let region = field(HEADER_REGION, SENTINEL_UNKNOWN);
        let routing_decision = field(HEADER_ROUTING_DECISION, SENTINEL_UNKNOWN);

        let set_cookies = headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();

        Self {
            status,
            set_cookies,
            backend_pool,
            session_id,
            request_id,
            region,
            routing_decision,
            missing,
        }
    }

    /// True when the response actually carried header `name` (one of the
    /// `HEADER_*` constants). A server literally sending the sentinel value
    /// still counts as present.
    pub fn has_field(&self, name: &str) -> bool {
        !self.missing.iter().any(|m| m.eq_ignore_ascii_case(name))
    }

    /// Value captured for header `name`, sentinel included.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name.to_ascii_lowercase().as_str() {
            HEADER_BACKEND_POOL => Some(self.backend_pool.as_str()),
            HEADER_SESSION_ID => Some(self.session_id.as_str()),
            HEADER_REQUEST_ID => Some(self.request_id.as_str()),
            HEADER_REGION => Some(self.region.as_str()),
            HEADER_ROUTING_DECISION => Some(self.routing_decision.as_str()),
            _ => None,
        }
    }
}

/// One request paired with its response.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub request: RequestRecord,
    pub response: ResponseRecord,
}

/// A request whose dispatch failed at the transport level.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRequest {
    pub request: RequestRecord,
    pub error: NetworkError,
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
