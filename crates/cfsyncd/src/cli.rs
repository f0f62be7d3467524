//! Command-line argument definitions using clap.
//!
//! Every setting can also be passed with the settings-file key as the flag
//! name (`--CloudFlare:ApiToken=...`, `--UpdateIntervalSeconds=60`).

use cfsync_core::config::env_keys;
use cfsync_core::{ConfigOverrides, IpVersion};
use clap::Parser;
use std::path::PathBuf;

/// Keep Cloudflare address records pointed at this machine's public IP
///
/// Command-line values override environment variables, which override the
/// settings file.
#[derive(Parser)]
#[command(name = "cfsyncd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (default: ./appsettings.json if present)
    #[arg(short, long, env = env_keys::CONFIG_PATH)]
    pub config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, env = env_keys::LOG_LEVEL)]
    pub log_level: Option<String>,

    /// Cloudflare API token
    #[arg(long, visible_alias = "CloudFlare:ApiToken")]
    pub api_token: Option<String>,

    /// Cloudflare account email (with --api-key)
    #[arg(long, visible_alias = "CloudFlare:Email")]
    pub email: Option<String>,

    /// Cloudflare global API key (with --email)
    #[arg(long, visible_alias = "CloudFlare:ApiKey")]
    pub api_key: Option<String>,

    /// Seconds between passes
    #[arg(long, visible_alias = "UpdateIntervalSeconds")]
    pub update_interval: Option<u64>,

    /// IP echo endpoints, comma separated, tried in order
    #[arg(long, value_delimiter = ',')]
    pub ip_endpoints: Vec<String>,

    /// Per-endpoint timeout in seconds
    #[arg(long)]
    pub endpoint_timeout: Option<u64>,

    /// Accepted address family: v4, v6 or both
    #[arg(long)]
    pub ip_version: Option<IpVersion>,

    /// Log intended updates without sending them
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// The configuration layer these arguments represent
    pub fn overrides(&self) -> ConfigOverrides {
        let endpoints: Vec<String> = self
            .ip_endpoints
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        ConfigOverrides {
            api_token: self.api_token.clone(),
            email: self.email.clone(),
            api_key: self.api_key.clone(),
            update_interval_secs: self.update_interval,
            ip_echo_endpoints: (!endpoints.is_empty()).then_some(endpoints),
            endpoint_timeout_secs: self.endpoint_timeout,
            ip_version: self.ip_version,
            dry_run: self.dry_run,
        }
    }
}
