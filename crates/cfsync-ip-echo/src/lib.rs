// # HTTP IP Echo Resolver
//
// This crate resolves the caller's external address by asking public
// "IP echo" services, which answer a plain GET with the caller's address as
// bare text.
//
// ## Behavior
//
// Endpoints are consulted strictly in order, one request at a time:
// - non-success status, network failure, timeout → try the next endpoint
// - body that does not parse as an address (e.g. an HTML error page served
//   with 200) → try the next endpoint
// - first usable address → returned, remaining endpoints are not queried
//
// Running out of endpoints yields `None`, which the engine treats as
// "skip this tick".

use cfsync_core::config::{DEFAULT_IP_ECHO_ENDPOINTS, IpVersion};
use cfsync_core::traits::IpSource;
use cfsync_core::{Error, Result, UpdaterConfig};

use std::net::IpAddr;
use std::time::Duration;

/// Default per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// User agent sent to echo services; some refuse requests without one
const USER_AGENT: &str = concat!("cfsync/", env!("CARGO_PKG_VERSION"));

/// External address resolver over plain-text echo services
#[derive(Debug, Clone)]
pub struct HttpIpSource {
    /// Endpoints, in the order they are tried
    endpoints: Vec<String>,

    /// Accepted address family
    version: IpVersion,

    /// HTTP client (carries the per-request timeout)
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a resolver over `endpoints`
    ///
    /// # Parameters
    ///
    /// - `endpoints`: URLs to try, in order
    /// - `version`: accepted address family
    /// - `timeout`: bound on each individual request
    pub fn new(endpoints: Vec<String>, version: IpVersion, timeout: Duration) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::config("At least one IP echo endpoint is required"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoints,
            version,
            client,
        })
    }

    /// Create a resolver over the built-in public services, IPv4 only
    pub fn with_defaults() -> Result<Self> {
        Self::new(
            DEFAULT_IP_ECHO_ENDPOINTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            IpVersion::V4,
            DEFAULT_TIMEOUT,
        )
    }

    /// Create a resolver from the updater configuration
    pub fn from_config(config: &UpdaterConfig) -> Result<Self> {
        Self::new(
            config.ip_echo_endpoints.clone(),
            config.ip_version,
            config.endpoint_timeout(),
        )
    }

    /// Endpoints in the order they are tried
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Fetch and parse the address from a single endpoint
    async fn fetch_ip(&self, url: &str) -> Result<IpAddr> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::http(format!("HTTP error: {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response: {}", e)))?;

        let ip = parse_echo_body(&body).ok_or_else(|| {
            Error::invalid_input(format!("Not an IP address: {:?}", truncate(&body, 64)))
        })?;

        if !self.version.accepts(&ip) {
            return Err(Error::invalid_input(format!(
                "Expected {:?} address, got: {}",
                self.version, ip
            )));
        }

        Ok(ip)
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn resolve(&self) -> Option<IpAddr> {
        for url in &self.endpoints {
            match self.fetch_ip(url).await {
                Ok(ip) => {
                    tracing::debug!(endpoint = %url, %ip, "Resolved external address");
                    return Some(ip);
                }
                Err(e) => {
                    tracing::debug!(endpoint = %url, error = %e, "IP echo endpoint failed, trying next");
                }
            }
        }

        None
    }

    fn source_name(&self) -> &'static str {
        "http-echo"
    }
}

/// Parse an echo service response body
///
/// Tabs, carriage returns and newlines are removed wherever they appear,
/// then surrounding whitespace is trimmed.
pub fn parse_echo_body(body: &str) -> Option<IpAddr> {
    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, '\t' | '\r' | '\n'))
        .collect();

    cleaned.trim().parse().ok()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
