//! Configuration types for cfsync
//!
//! Configuration is read once at startup from three layers, later ones
//! winning: an optional JSON settings file, the process environment, and
//! command-line overrides. Nothing here is mutated after the engine is
//! constructed.
//!
//! A credential that is present but looks wrong (placeholder token, odd
//! email) is only warned about: the provider will reject it on every tick
//! and say so in the logs. Only a missing credential stops startup.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Public IP echo services, consulted in this order
pub const DEFAULT_IP_ECHO_ENDPOINTS: &[&str] = &[
    "https://ipecho.net/plain",
    "https://icanhazip.com/",
    "https://whatismyip.akamai.com",
    "https://tnx.nl/ip",
];

/// Environment variable names understood by cfsync
pub mod env_keys {
    pub const API_TOKEN: &str = "CLOUDFLARE_API_TOKEN";
    pub const EMAIL: &str = "CLOUDFLARE_EMAIL";
    pub const API_KEY: &str = "CLOUDFLARE_API_KEY";
    pub const UPDATE_INTERVAL: &str = "UPDATE_INTERVAL_SECONDS";
    pub const IP_ENDPOINTS: &str = "CFSYNC_IP_ENDPOINTS";
    pub const ENDPOINT_TIMEOUT: &str = "CFSYNC_ENDPOINT_TIMEOUT_SECS";
    pub const IP_VERSION: &str = "CFSYNC_IP_VERSION";
    pub const MODE: &str = "CFSYNC_MODE";
    pub const CONFIG_PATH: &str = "CFSYNC_CONFIG";
    pub const LOG_LEVEL: &str = "CFSYNC_LOG_LEVEL";
}

/// Credential used to authenticate against the DNS provider API
///
/// Chosen once at startup: a non-empty API token wins, otherwise the
/// email + global API key pair is used.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    /// Scoped API token (`Authorization: Bearer ...`)
    ApiToken {
        /// Token value
        token: String,
    },

    /// Account email and global API key (`X-Auth-Email` / `X-Auth-Key`)
    EmailKey {
        /// Account email
        email: String,
        /// Global API key
        api_key: String,
    },
}

impl Credential {
    /// Select a credential from the optional configuration values.
    ///
    /// Empty strings count as absent.
    pub fn from_parts(
        api_token: Option<String>,
        email: Option<String>,
        api_key: Option<String>,
    ) -> Result<Self> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        if let Some(token) = present(api_token) {
            return Ok(Credential::ApiToken { token });
        }

        match (present(email), present(api_key)) {
            (Some(email), Some(api_key)) => Ok(Credential::EmailKey { email, api_key }),
            (Some(_), None) => Err(Error::config(
                "CloudFlare email is set but the API key is missing",
            )),
            (None, Some(_)) => Err(Error::config(
                "CloudFlare API key is set but the email is missing",
            )),
            (None, None) => Err(Error::config(
                "No CloudFlare credential configured: set an API token, or an email and API key",
            )),
        }
    }

    /// Short name of the credential kind, safe to log
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::ApiToken { .. } => "api_token",
            Credential::EmailKey { .. } => "email_key",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Credential::ApiToken { token } => {
                if token.trim().is_empty() {
                    return Err(Error::config("CloudFlare API token cannot be empty"));
                }

                let lower = token.to_lowercase();
                if lower.contains("your_token") || lower.contains("replace_me") || lower == "token"
                {
                    tracing::warn!(
                        "CloudFlare API token appears to be a placeholder; provider calls will fail until it is replaced"
                    );
                }
            }
            Credential::EmailKey { email, api_key } => {
                if email.trim().is_empty() || api_key.trim().is_empty() {
                    return Err(Error::config(
                        "CloudFlare email and API key must both be set",
                    ));
                }

                if !email.contains('@') {
                    tracing::warn!(%email, "CloudFlare email does not look like an address");
                }
            }
        }

        Ok(())
    }
}

// Secrets never reach Debug output
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::ApiToken { .. } => f
                .debug_struct("ApiToken")
                .field("token", &"<REDACTED>")
                .finish(),
            Credential::EmailKey { email, .. } => f
                .debug_struct("EmailKey")
                .field("email", email)
                .field("api_key", &"<REDACTED>")
                .finish(),
        }
    }
}

/// Which address family the resolver accepts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    /// IPv4 only
    #[default]
    V4,
    /// IPv6 only
    V6,
    /// Either family
    Both,
}

impl IpVersion {
    /// Whether `ip` belongs to an accepted family
    pub fn accepts(&self, ip: &std::net::IpAddr) -> bool {
        match self {
            IpVersion::V4 => ip.is_ipv4(),
            IpVersion::V6 => ip.is_ipv6(),
            IpVersion::Both => true,
        }
    }
}

impl std::str::FromStr for IpVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "v4" | "ipv4" | "4" => Ok(IpVersion::V4),
            "v6" | "ipv6" | "6" => Ok(IpVersion::V6),
            "both" | "any" => Ok(IpVersion::Both),
            other => Err(Error::config(format!(
                "Unknown IP version '{}'. Valid: v4, v6, both",
                other
            ))),
        }
    }
}

/// Main updater configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Provider credential
    pub credential: Credential,

    /// Delay between the end of one pass and the start of the next
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,

    /// Ordered list of IP echo endpoints
    #[serde(default = "default_ip_echo_endpoints")]
    pub ip_echo_endpoints: Vec<String>,

    /// Per-endpoint request timeout
    #[serde(default = "default_endpoint_timeout_secs")]
    pub endpoint_timeout_secs: u64,

    /// Address family accepted from the echo endpoints
    #[serde(default)]
    pub ip_version: IpVersion,

    /// Log intended updates instead of sending them
    #[serde(default)]
    pub dry_run: bool,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl UpdaterConfig {
    /// Create a configuration with defaults for everything but the credential
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            update_interval_secs: default_update_interval_secs(),
            ip_echo_endpoints: default_ip_echo_endpoints(),
            endpoint_timeout_secs: default_endpoint_timeout_secs(),
            ip_version: IpVersion::default(),
            dry_run: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Build the configuration from a settings file and an environment lookup.
    ///
    /// Values from `env` override values from `file`. `env` is a lookup
    /// function so callers can pass `std::env::var(..).ok()` or a map in tests.
    pub fn from_sources<F>(file: Option<SettingsFile>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_layers(file, env, &ConfigOverrides::default())
    }

    /// Build the configuration from all three layers
    ///
    /// Precedence, lowest to highest: `file`, `env`, `overrides`.
    pub fn from_layers<F>(
        file: Option<SettingsFile>,
        env: F,
        overrides: &ConfigOverrides,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = file.unwrap_or_default();
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let arg = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());

        let credential = Credential::from_parts(
            arg(&overrides.api_token)
                .or_else(|| env(env_keys::API_TOKEN))
                .or(file.cloud_flare.api_token),
            arg(&overrides.email)
                .or_else(|| env(env_keys::EMAIL))
                .or(file.cloud_flare.email),
            arg(&overrides.api_key)
                .or_else(|| env(env_keys::API_KEY))
                .or(file.cloud_flare.api_key),
        )?;

        let mut config = UpdaterConfig::new(credential);

        if let Some(secs) = overrides.update_interval_secs {
            config.update_interval_secs = secs;
        } else if let Some(raw) = env(env_keys::UPDATE_INTERVAL) {
            config.update_interval_secs = parse_secs(env_keys::UPDATE_INTERVAL, &raw)?;
        } else if let Some(secs) = file.update_interval_seconds {
            config.update_interval_secs = secs;
        }

        if let Some(endpoints) = overrides.ip_echo_endpoints.as_ref().filter(|e| !e.is_empty()) {
            config.ip_echo_endpoints = endpoints.clone();
        } else if let Some(raw) = env(env_keys::IP_ENDPOINTS) {
            config.ip_echo_endpoints = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(secs) = overrides.endpoint_timeout_secs {
            config.endpoint_timeout_secs = secs;
        } else if let Some(raw) = env(env_keys::ENDPOINT_TIMEOUT) {
            config.endpoint_timeout_secs = parse_secs(env_keys::ENDPOINT_TIMEOUT, &raw)?;
        }

        if let Some(version) = overrides.ip_version {
            config.ip_version = version;
        } else if let Some(raw) = env(env_keys::IP_VERSION) {
            config.ip_version = raw.parse()?;
        }

        config.dry_run = overrides.dry_run
            || env(env_keys::MODE)
                .map(|m| m.trim().eq_ignore_ascii_case("dry-run"))
                .unwrap_or(false);

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.credential.validate()?;

        if self.update_interval_secs == 0 {
            return Err(Error::config("Update interval must be > 0 seconds"));
        }

        if self.endpoint_timeout_secs == 0 {
            return Err(Error::config("Endpoint timeout must be > 0 seconds"));
        }

        if self.event_channel_capacity == 0 {
            return Err(Error::config("Event channel capacity must be > 0"));
        }

        if self.ip_echo_endpoints.is_empty() {
            return Err(Error::config("At least one IP echo endpoint is required"));
        }

        for url in &self.ip_echo_endpoints {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(Error::config(format!(
                    "IP echo endpoint must use HTTP or HTTPS scheme. Got: {}",
                    url
                )));
            }

            if url.starts_with("http://") {
                tracing::warn!(endpoint = %url, "IP echo endpoint uses plain HTTP");
            }
        }

        Ok(())
    }

    /// Interval between passes
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    /// Per-endpoint request timeout
    pub fn endpoint_timeout(&self) -> Duration {
        Duration::from_secs(self.endpoint_timeout_secs)
    }
}

/// Command-line layer of the configuration
///
/// `None` (or `false`) leaves the lower layers in charge.
#[derive(Clone, Default)]
pub struct ConfigOverrides {
    pub api_token: Option<String>,
    pub email: Option<String>,
    pub api_key: Option<String>,
    pub update_interval_secs: Option<u64>,
    pub ip_echo_endpoints: Option<Vec<String>>,
    pub endpoint_timeout_secs: Option<u64>,
    pub ip_version: Option<IpVersion>,
    /// Only ever switches dry-run on
    pub dry_run: bool,
}

impl std::fmt::Debug for ConfigOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigOverrides")
            .field("api_token", &self.api_token.as_ref().map(|_| "<REDACTED>"))
            .field("email", &self.email)
            .field("api_key", &self.api_key.as_ref().map(|_| "<REDACTED>"))
            .field("update_interval_secs", &self.update_interval_secs)
            .field("ip_echo_endpoints", &self.ip_echo_endpoints)
            .field("endpoint_timeout_secs", &self.endpoint_timeout_secs)
            .field("ip_version", &self.ip_version)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| Error::config(format!("{} must be a whole number of seconds. Got: {}", key, raw)))
}

fn default_update_interval_secs() -> u64 {
    30
}

fn default_endpoint_timeout_secs() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    256
}

fn default_ip_echo_endpoints() -> Vec<String> {
    DEFAULT_IP_ECHO_ENDPOINTS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Shape of the optional `appsettings.json` file
///
/// ```json
/// {
///   "CloudFlare": { "ApiToken": "..." },
///   "UpdateIntervalSeconds": 30
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SettingsFile {
    /// `CloudFlare` section
    #[serde(rename = "CloudFlare", default)]
    pub cloud_flare: CloudFlareSection,

    /// `UpdateIntervalSeconds`
    #[serde(default)]
    pub update_interval_seconds: Option<u64>,
}

/// `CloudFlare` section of the settings file
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CloudFlareSection {
    /// `CloudFlare:ApiToken`
    #[serde(default)]
    pub api_token: Option<String>,

    /// `CloudFlare:Email`
    #[serde(default)]
    pub email: Option<String>,

    /// `CloudFlare:ApiKey`
    #[serde(default)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for CloudFlareSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudFlareSection")
            .field("api_token", &self.api_token.as_ref().map(|_| "<REDACTED>"))
            .field("email", &self.email)
            .field("api_key", &self.api_key.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl SettingsFile {
    /// Parse settings from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a settings file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn token_wins_over_email_and_key() {
        let cred = Credential::from_parts(
            Some("abc".to_string()),
            Some("me@example.com".to_string()),
            Some("key".to_string()),
        )
        .unwrap();
        assert_eq!(cred.kind(), "api_token");
    }

    #[test]
    fn empty_token_falls_back_to_email_and_key() {
        let cred = Credential::from_parts(
            Some("  ".to_string()),
            Some("me@example.com".to_string()),
            Some("key".to_string()),
        )
        .unwrap();
        assert_eq!(
            cred,
            Credential::EmailKey {
                email: "me@example.com".to_string(),
                api_key: "key".to_string(),
            }
        );
    }

    #[test]
    fn half_a_key_pair_is_rejected() {
        let err = Credential::from_parts(None, Some("me@example.com".to_string()), None)
            .unwrap_err();
        assert!(err.to_string().contains("API key is missing"));

        assert!(Credential::from_parts(None, None, None).is_err());
    }

    #[test]
    fn credential_debug_is_redacted() {
        let token = Credential::ApiToken {
            token: "secret_token_12345".to_string(),
        };
        let pair = Credential::EmailKey {
            email: "me@example.com".to_string(),
            api_key: "global_key_67890".to_string(),
        };

        let dbg = format!("{:?} {:?}", token, pair);
        assert!(!dbg.contains("secret_token_12345"));
        assert!(!dbg.contains("global_key_67890"));
        assert!(dbg.contains("me@example.com"));
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = UpdaterConfig::new(Credential::ApiToken {
            token: "abc".to_string(),
        });
        assert_eq!(config.update_interval(), Duration::from_secs(30));
        assert_eq!(config.ip_echo_endpoints.len(), 4);
        assert_eq!(config.ip_echo_endpoints[0], "https://ipecho.net/plain");
        assert_eq!(config.ip_version, IpVersion::V4);
        assert!(!config.dry_run);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn settings_file_uses_pascal_case_keys() {
        let file = SettingsFile::from_json(
            r#"{"CloudFlare": {"Email": "me@example.com", "ApiKey": "k"}, "UpdateIntervalSeconds": 120}"#,
        )
        .unwrap();

        let config = UpdaterConfig::from_sources(Some(file), |_| None).unwrap();
        assert_eq!(config.credential.kind(), "email_key");
        assert_eq!(config.update_interval_secs, 120);
    }

    #[test]
    fn environment_overrides_settings_file() {
        let file = SettingsFile::from_json(
            r#"{"CloudFlare": {"ApiToken": "from-file"}, "UpdateIntervalSeconds": 120}"#,
        )
        .unwrap();

        let config = UpdaterConfig::from_sources(
            Some(file),
            lookup(&[
                (env_keys::API_TOKEN, "from-env"),
                (env_keys::UPDATE_INTERVAL, "45"),
                (env_keys::IP_ENDPOINTS, "https://a.example/ip, https://b.example/ip"),
                (env_keys::IP_VERSION, "both"),
                (env_keys::MODE, "dry-run"),
            ]),
        )
        .unwrap();

        assert_eq!(
            config.credential,
            Credential::ApiToken {
                token: "from-env".to_string()
            }
        );
        assert_eq!(config.update_interval_secs, 45);
        assert_eq!(
            config.ip_echo_endpoints,
            vec!["https://a.example/ip", "https://b.example/ip"]
        );
        assert_eq!(config.ip_version, IpVersion::Both);
        assert!(config.dry_run);
    }

    #[test]
    fn non_numeric_interval_is_a_config_error() {
        let result = UpdaterConfig::from_sources(
            None,
            lookup(&[
                (env_keys::API_TOKEN, "abc"),
                (env_keys::UPDATE_INTERVAL, "soon"),
            ]),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn suspicious_credentials_only_warn() {
        let config = UpdaterConfig::new(Credential::ApiToken {
            token: "replace_me".to_string(),
        });
        assert!(config.validate().is_ok());

        let config = UpdaterConfig::new(Credential::EmailKey {
            email: "not-an-address".to_string(),
            api_key: "global-key".to_string(),
        });
        assert!(config.validate().is_ok());

        let config = UpdaterConfig::new(Credential::ApiToken {
            token: "  ".to_string(),
        });
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn command_line_overrides_environment_and_file() {
        let file = SettingsFile::from_json(
            r#"{"CloudFlare": {"ApiToken": "from-file"}, "UpdateIntervalSeconds": 10}"#,
        )
        .unwrap();
        let env = lookup(&[
            (env_keys::API_TOKEN, "from-env"),
            (env_keys::UPDATE_INTERVAL, "20"),
            (env_keys::IP_VERSION, "v6"),
        ]);
        let overrides = ConfigOverrides {
            api_token: Some("from-args".to_string()),
            update_interval_secs: Some(30),
            ..ConfigOverrides::default()
        };

        let config = UpdaterConfig::from_layers(Some(file.clone()), &env, &overrides).unwrap();
        assert_eq!(
            config.credential,
            Credential::ApiToken {
                token: "from-args".to_string()
            }
        );
        assert_eq!(config.update_interval_secs, 30);
        // Untouched by the command line, so the environment still wins
        assert_eq!(config.ip_version, IpVersion::V6);

        let config =
            UpdaterConfig::from_layers(Some(file), &env, &ConfigOverrides::default()).unwrap();
        assert_eq!(
            config.credential,
            Credential::ApiToken {
                token: "from-env".to_string()
            }
        );
        assert_eq!(config.update_interval_secs, 20);
    }

    #[test]
    fn command_line_alone_is_enough() {
        let overrides = ConfigOverrides {
            email: Some("ops@example.com".to_string()),
            api_key: Some("global-key".to_string()),
            ip_echo_endpoints: Some(vec!["https://a.example/ip".to_string()]),
            dry_run: true,
            ..ConfigOverrides::default()
        };

        let config = UpdaterConfig::from_layers(None, |_: &str| None, &overrides).unwrap();
        assert_eq!(config.credential.kind(), "email_key");
        assert_eq!(config.ip_echo_endpoints, vec!["https://a.example/ip"]);
        assert!(config.dry_run);
        assert!(!format!("{:?}", overrides).contains("global-key"));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = UpdaterConfig::new(Credential::ApiToken {
            token: "abc".to_string(),
        });
        config.update_interval_secs = 0;
        assert!(config.validate().is_err());

        config.update_interval_secs = 30;
        config.ip_echo_endpoints = vec!["ftp://example.com/ip".to_string()];
        assert!(config.validate().is_err());

        config.ip_echo_endpoints.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn settings_file_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appsettings.json");
        std::fs::write(&path, r#"{"CloudFlare": {"ApiToken": "abc"}}"#).unwrap();

        let file = SettingsFile::load(&path).unwrap();
        assert_eq!(file.cloud_flare.api_token.as_deref(), Some("abc"));
        assert_eq!(file.update_interval_seconds, None);

        assert!(SettingsFile::load(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn ip_version_filters_families() {
        let v4: std::net::IpAddr = "203.0.113.7".parse().unwrap();
        let v6: std::net::IpAddr = "2001:db8::1".parse().unwrap();

        assert!(IpVersion::V4.accepts(&v4));
        assert!(!IpVersion::V4.accepts(&v6));
        assert!(IpVersion::V6.accepts(&v6));
        assert!(IpVersion::Both.accepts(&v4));
        assert!("ipv6".parse::<IpVersion>().is_ok());
        assert!("v5".parse::<IpVersion>().is_err());
    }
}
