//! Session-affinity verification for HTTP gateways.
//!
//! A [`CookieTrackingTransport`](transport::CookieTrackingTransport) replays
//! the cookies a gateway hands out and records the routing headers of every
//! response; an [`AffinityVerifier`](verifier::AffinityVerifier) drives a
//! chain of dependent calls through it and decides whether the session stayed
//! on one backend.

pub mod config;
pub mod cookies;
pub mod errors;
pub mod net;
pub mod transport;
pub mod verifier;

pub use config::GatewayConfig;
pub use errors::{AffinityError, ConfigError, CookieError, NetworkError};
pub use verifier::{AffinityVerifier, Verdict};
