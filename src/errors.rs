//! Error kinds used throughout the harness.
//!
//! The transport layer only ever produces [`NetworkError`] (and logs
//! [`CookieError`]s while skipping the offending header). Everything that has
//! a bearing on the affinity verdict is expressed as an [`AffinityError`],
//! which the verifier folds into a [`Verdict`](crate::verifier::Verdict).

/// Transport-level failure. Never interpreted semantically by the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NetworkError::Timeout(e.to_string())
        } else if e.is_connect() {
            NetworkError::Connect(e.to_string())
        } else if e.is_builder() || e.is_request() {
            NetworkError::InvalidRequest(e.to_string())
        } else {
            NetworkError::Other(e.to_string())
        }
    }
}

/// A `Set-Cookie` header that could not be applied to the jar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CookieError {
    #[error("Malformed set-cookie header: {0}")]
    MalformedCookieHeader(String),

    #[error("Set-cookie header is not valid UTF-8")]
    NotUtf8,

    #[error("Cookie domain {domain} does not match request host {host}")]
    ForeignDomain { domain: String, host: String },
}

/// Missing or invalid gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration value: {0}")]
    Missing(&'static str),

    #[error("Invalid gateway URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Everything that can stop a session from being judged AFFINE.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AffinityError {
    #[error("Step {step}: {source}")]
    Network { step: usize, source: NetworkError },

    #[error("Step {step}: response carried no {field} header")]
    MissingRoutingMetadata { step: usize, field: &'static str },

    #[error("Step {step}: identifier {id} from an earlier step was not found on the backend (status {status})")]
    DependentCallNotFound { step: usize, id: String, status: u16 },

    #[error("Responses were served by different backends: {}", observed.join(", "))]
    BackendMismatch { observed: Vec<String> },

    #[error("Step {step}: unexpected status {status}")]
    UnexpectedStatus { step: usize, status: u16 },

    #[error("Step {step}: no identifier available from step {reference}")]
    UnresolvedDependency { step: usize, reference: usize },

    #[error("Session has no steps")]
    EmptySession,
}

impl AffinityError {
    /// True when the error is positive evidence that affinity did not hold.
    pub fn is_routing_failure(&self) -> bool {
        matches!(
            self,
            AffinityError::DependentCallNotFound { .. } | AffinityError::BackendMismatch { .. }
        )
    }

    /// Short reason used when the error is rendered as part of a verdict.
    pub fn label(&self) -> &'static str {
        match self {
            AffinityError::Network { .. } => "network error",
            AffinityError::MissingRoutingMetadata { .. } => "missing routing metadata",
            AffinityError::DependentCallNotFound { .. } => "dependent identifier not found on backend",
            AffinityError::BackendMismatch { .. } => "backend mismatch",
            AffinityError::UnexpectedStatus { .. } => "unexpected status",
            AffinityError::UnresolvedDependency { .. } => "unresolved dependency",
            AffinityError::EmptySession => "empty session",
        }
    }
}
