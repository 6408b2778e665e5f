//! Runtime configuration
//!
//! Holds the mirror origin, fan-out width, timeouts and the fixed set of
//! headers sent with every outbound request.

use crate::proxy::OutboundHeaders;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised when validating a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A URL setting could not be parsed or is not http(s)
    #[error("Invalid {name} URL '{value}': {reason}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// At least one mirror server must be probed
    #[error("Server count must be at least 1")]
    NoServers,

    /// A timeout setting is zero
    #[error("Timeout '{0}' must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// Default mirror origin
pub const DEFAULT_BASE_URL: &str = "https://player.vidzee.wtf";

/// Default number of mirror servers probed per aggregation
pub const DEFAULT_SERVER_COUNT: usize = 14;

/// Default origin of the proxy that serves rewritten URLs
pub const DEFAULT_PROXY_BASE_URL: &str = "http://localhost:3000";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/150 Safari/537.36";
const DEFAULT_ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Configuration for a source aggregation run
#[derive(Debug, Clone, PartialEq)]
pub struct ScoutConfig {
    /// Origin hosting the `/api/server` endpoint
    pub base_url: String,
    /// Number of mirror servers to probe (server indices `0..server_count`)
    pub server_count: usize,
    /// Timeout applied to each individual probe
    pub probe_timeout: Duration,
    /// Timeout applied to the health probe
    pub health_timeout: Duration,
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    /// Origin of the proxy that rewritten URLs point at
    pub proxy_base_url: String,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            server_count: DEFAULT_SERVER_COUNT,
            probe_timeout: Duration::from_secs(8),
            health_timeout: Duration::from_secs(5),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            proxy_base_url: DEFAULT_PROXY_BASE_URL.to_string(),
        }
    }
}

impl ScoutConfig {
    /// Checks that the configuration can drive an aggregation
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_http_url("base", &self.base_url)?;
        parse_http_url("proxy", &self.proxy_base_url)?;

        if self.server_count == 0 {
            return Err(ConfigError::NoServers);
        }
        if self.probe_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("probe"));
        }
        if self.health_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("health"));
        }

        Ok(())
    }

    /// Base URL without a trailing slash
    pub fn origin(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Parsed proxy origin
    pub fn proxy_url(&self) -> Result<Url, ConfigError> {
        parse_http_url("proxy", &self.proxy_base_url)
    }

    /// The fixed headers sent with every mirror request
    ///
    /// `Referer` and `Origin` both carry the mirror origin.
    pub fn outbound_headers(&self) -> OutboundHeaders {
        OutboundHeaders::from([
            ("User-Agent".to_string(), self.user_agent.clone()),
            ("Accept".to_string(), self.accept.clone()),
            ("Accept-Language".to_string(), self.accept_language.clone()),
            ("Referer".to_string(), self.origin().to_string()),
            ("Origin".to_string(), self.origin().to_string()),
        ])
    }
}

/// Parses `value` and requires an absolute http(s) URL with a host
pub(crate) fn parse_http_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        name,
        value: value.to_string(),
        reason,
    };

    let url = Url::parse(value).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    Ok(url)
}
