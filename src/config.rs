//! Gateway configuration.
//!
//! `GatewayConfig` describes where the gateway lives and how to authenticate
//! against it. It is passed explicitly into the transport and verifier
//! constructors; nothing in the library reads the process environment except
//! [`GatewayConfig::from_env`].
//!
//! # Examples
//!
//! ## Customize with the builder
//! ```rust
//! use session_affinity::config::GatewayConfig;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = GatewayConfig::builder()
//!     .gateway_url("https://apim.example.net")
//!     .api_key("secret")
//!     .deployment("gpt-4.1-mini")
//!     .build()?; // returns Result<GatewayConfig, ConfigError>
//! assert_eq!(cfg.api_path, "inference/openai");
//! # Ok(()) }
//! ```

use crate::errors::ConfigError;
use std::fmt;
use std::time::Duration;
use url::Url;

const DEFAULT_API_PATH: &str = "inference/openai";
const DEFAULT_API_VERSION: &str = "2025-03-01-preview";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_USER_AGENT: &str = concat!("session-affinity/", env!("CARGO_PKG_VERSION"));

pub const ENV_GATEWAY_URL: &str = "APIM_GATEWAY_URL";
pub const ENV_API_KEY: &str = "API_KEY";
pub const ENV_DEPLOYMENT: &str = "DEPLOYMENT";
pub const ENV_API_PATH: &str = "API_PATH";
pub const ENV_API_VERSION: &str = "API_VERSION";
pub const ENV_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";
pub const ENV_AFFINITY_FIELD: &str = "AFFINITY_FIELD";

/// Diagnostic header that identifies which backend served a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AffinityField {
    #[default]
    BackendPool,
    Region,
}

impl AffinityField {
    pub fn header_name(&self) -> &'static str {
        match self {
            AffinityField::BackendPool => crate::transport::HEADER_BACKEND_POOL,
            AffinityField::Region => crate::transport::HEADER_REGION,
        }
    }
}

impl fmt::Display for AffinityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AffinityField::BackendPool => f.write_str("backend-pool"),
            AffinityField::Region => f.write_str("region"),
        }
    }
}

impl std::str::FromStr for AffinityField {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backend-pool" | "backend_pool" | "pool" => Ok(AffinityField::BackendPool),
            "region" => Ok(AffinityField::Region),
            _ => Err(ConfigError::InvalidValue { key: ENV_AFFINITY_FIELD, value: s.to_string() }),
        }
    }
}

#[derive(Clone)]
pub struct GatewayConfig {
    pub gateway_url: Url,
    pub api_key: String,
    pub deployment: String,
    pub api_path: String,
    pub api_version: Option<String>,
    pub timeout: Duration,
    pub user_agent: String,
    pub affinity_field: AffinityField,
}

// The credential never ends up in logs.
impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("gateway_url", &self.gateway_url.as_str())
            .field("api_key", &"<redacted>")
            .field("deployment", &self.deployment)
            .field("api_path", &self.api_path)
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("affinity_field", &self.affinity_field)
            .finish()
    }
}

impl GatewayConfig {
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }

    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut builder = GatewayConfig::builder();
        if let Some(url) = get(ENV_GATEWAY_URL) {
            builder = builder.gateway_url(url);
        }
        if let Some(key) = get(ENV_API_KEY) {
            builder = builder.api_key(key);
        }
        if let Some(deployment) = get(ENV_DEPLOYMENT) {
            builder = builder.deployment(deployment);
        }
        if let Some(path) = get(ENV_API_PATH) {
            builder = builder.api_path(path);
        }
        if let Some(version) = get(ENV_API_VERSION) {
            builder = builder.api_version(version);
        }
        if let Some(secs) = get(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_TIMEOUT_SECS,
                value: secs.clone(),
            })?;
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(field) = get(ENV_AFFINITY_FIELD) {
            builder = builder.affinity_field(field.parse()?);
        }

        builder.build()
    }

    /// Resolves `path` against the API base (`gateway_url` + `api_path`) and
    /// appends the `api-version` query parameter when configured.
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.gateway_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(self.api_path.split('/').filter(|s| !s.is_empty()));
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
        }
        if let Some(version) = &self.api_version {
            url.query_pairs_mut().append_pair("api-version", version);
        }
        url
    }
}

/// Builder for [`GatewayConfig`]. Required fields are checked in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct GatewayConfigBuilder {
    gateway_url: Option<String>,
    api_key: Option<String>,
    deployment: Option<String>,
    api_path: String,
    api_version: Option<String>,
    timeout: Duration,
    user_agent: String,
    affinity_field: AffinityField,
}

impl Default for GatewayConfigBuilder {
    fn default() -> Self {
        Self {
            gateway_url: None,
            api_key: None,
            deployment: None,
            api_path: DEFAULT_API_PATH.to_string(),
            api_version: Some(DEFAULT_API_VERSION.to_string()),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            affinity_field: AffinityField::default(),
        }
    }
}

impl GatewayConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut GatewayConfigBuilder)) -> Self {
        f(&mut self);
        self
    }

    pub fn gateway_url<S: Into<String>>(self, url: S) -> Self { self.map(|c| c.gateway_url = Some(url.into())) }
    pub fn api_key<S: Into<String>>(self, key: S) -> Self { self.map(|c| c.api_key = Some(key.into())) }
    pub fn deployment<S: Into<String>>(self, name: S) -> Self { self.map(|c| c.deployment = Some(name.into())) }
    pub fn api_path<S: Into<String>>(self, path: S) -> Self { self.map(|c| c.api_path = path.into()) }
    pub fn api_version<S: Into<String>>(self, version: S) -> Self { self.map(|c| c.api_version = Some(version.into())) }
    pub fn no_api_version(self) -> Self { self.map(|c| c.api_version = None) }
    pub fn timeout(self, timeout: Duration) -> Self { self.map(|c| c.timeout = timeout) }
    pub fn affinity_field(self, field: AffinityField) -> Self { self.map(|c| c.affinity_field = field) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<GatewayConfig, ConfigError> {
        let raw_url = required(self.gateway_url, ENV_GATEWAY_URL)?;
        let api_key = required(self.api_key, ENV_API_KEY)?;
        let deployment = required(self.deployment, ENV_DEPLOYMENT)?;

        let gateway_url = Url::parse(raw_url.trim()).map_err(|e| ConfigError::InvalidUrl {
            url: raw_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(gateway_url.scheme(), "http" | "https") || gateway_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl {
                url: raw_url,
                reason: "expected an http(s) base URL".to_string(),
            });
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidValue { key: ENV_TIMEOUT_SECS, value: "0".to_string() });
        }

        Ok(GatewayConfig {
            gateway_url,
            api_key,
            deployment,
            api_path: self.api_path,
            api_version: self.api_version,
            timeout: self.timeout,
            user_agent: self.user_agent,
            affinity_field: self.affinity_field,
        })
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}
