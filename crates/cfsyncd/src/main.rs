// # cfsyncd - Cloudflare record sync daemon
//
// Thin integration layer: reads configuration, builds the IP resolver and
// the Cloudflare provider, and runs the sync engine until SIGTERM/SIGINT.
// All reconciliation logic lives in cfsync-core.
//
// ## Configuration
//
// Three layers, later ones winning: an optional JSON settings file,
// environment variables, then command-line arguments (`cfsyncd --help`).
//
// ### Settings file
// - `CFSYNC_CONFIG` / `--config`: Path to the settings file (default:
//   `./appsettings.json` if it exists)
//
// ```json
// {
//   "CloudFlare": { "ApiToken": "..." },
//   "UpdateIntervalSeconds": 30
// }
// ```
//
// ### Environment
// - `CLOUDFLARE_API_TOKEN`: Scoped API token (preferred)
// - `CLOUDFLARE_EMAIL` / `CLOUDFLARE_API_KEY`: Global API key pair
// - `UPDATE_INTERVAL_SECONDS`: Seconds between passes (default: 30)
// - `CFSYNC_IP_ENDPOINTS`: Comma-separated IP echo URLs
// - `CFSYNC_ENDPOINT_TIMEOUT_SECS`: Per-endpoint timeout (default: 10)
// - `CFSYNC_IP_VERSION`: `v4` (default), `v6` or `both`
// - `CFSYNC_MODE`: `dry-run` to log updates without sending them
// - `CFSYNC_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export CLOUDFLARE_API_TOKEN=...
// export UPDATE_INTERVAL_SECONDS=60
// cfsyncd
//
// # or, same keys as the settings file
// cfsyncd --CloudFlare:ApiToken=... --UpdateIntervalSeconds=60
// ```

mod cli;

use anyhow::{Context, Result};
use cfsync_cloudflare::CloudflareProvider;
use cfsync_core::config::env_keys;
use cfsync_core::{EngineEvent, SettingsFile, SyncEngine, UpdaterConfig};
use cfsync_ip_echo::HttpIpSource;
use clap::Parser;
use cli::Cli;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Settings file looked up in the working directory when no path is given
const DEFAULT_SETTINGS_FILE: &str = "appsettings.json";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CfsyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<CfsyncExitCode> for ExitCode {
    fn from(code: CfsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match parse_log_level(cli.log_level.as_deref()) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return CfsyncExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return CfsyncExitCode::ConfigError.into();
    }

    let config = match config_or_exit(&cli, |key| env::var(key).ok()) {
        Ok(cfg) => cfg,
        Err(code) => return code.into(),
    };

    info!("Starting cfsyncd daemon");
    info!(
        credential = config.credential.kind(),
        interval_secs = config.update_interval_secs,
        endpoints = config.ip_echo_endpoints.len(),
        dry_run = config.dry_run,
        "Configuration loaded"
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CfsyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match build_engine(&config) {
            Ok(engine) => match run_daemon(engine).await {
                Ok(()) => CfsyncExitCode::CleanShutdown,
                Err(e) => {
                    error!("Daemon error: {:#}", e);
                    CfsyncExitCode::RuntimeError
                }
            },
            Err(e) => {
                error!("Startup error: {:#}", e);
                CfsyncExitCode::ConfigError
            }
        }
    });

    result.into()
}

/// Load the configuration, logging any failure as a configuration error
fn config_or_exit<F>(cli: &Cli, env: F) -> std::result::Result<UpdaterConfig, CfsyncExitCode>
where
    F: Fn(&str) -> Option<String>,
{
    load_config(cli, env).map_err(|e| {
        error!("Configuration error: {:#}", e);
        CfsyncExitCode::ConfigError
    })
}

/// Merge the settings file (if any), the environment and the command line
/// into a validated config
fn load_config<F>(cli: &Cli, env: F) -> Result<UpdaterConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let file = match settings_path(cli.config.as_deref()) {
        Some(path) => {
            info!(path = %path.display(), "Reading settings file");
            Some(
                SettingsFile::load(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
            )
        }
        None => None,
    };

    let config = UpdaterConfig::from_layers(file, env, &cli.overrides())?;
    config.validate()?;
    Ok(config)
}

/// Explicit path, else the default file when present
fn settings_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit
        && !path.as_os_str().is_empty()
    {
        return Some(path.to_path_buf());
    }

    let default = PathBuf::from(DEFAULT_SETTINGS_FILE);
    default.is_file().then_some(default)
}

fn parse_log_level(raw: Option<&str>) -> Result<Level> {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("info") => Ok(Level::INFO),
        Some("trace") => Ok(Level::TRACE),
        Some("debug") => Ok(Level::DEBUG),
        Some("warn") => Ok(Level::WARN),
        Some("error") => Ok(Level::ERROR),
        Some(other) => anyhow::bail!(
            "{} '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            env_keys::LOG_LEVEL,
            other
        ),
    }
}

fn build_engine(config: &UpdaterConfig) -> Result<(SyncEngine, mpsc::Receiver<EngineEvent>)> {
    let ip_source = HttpIpSource::from_config(config).context("Failed to create IP resolver")?;
    let provider =
        CloudflareProvider::from_config(config).context("Failed to create Cloudflare provider")?;

    SyncEngine::new(Box::new(ip_source), Box::new(provider), config)
        .context("Failed to create sync engine")
}

/// Run the engine until a shutdown signal arrives
async fn run_daemon(
    (engine, mut events): (SyncEngine, mpsc::Receiver<EngineEvent>),
) -> Result<()> {
    let shutdown = shutdown_signal()?;

    // The engine already logs every outcome; keep the channel drained
    let drain = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "Engine event");
        }
    });

    engine.run_until(shutdown).await;
    info!("Shutting down daemon");

    drop(engine);
    drain.await.context("Event drain task failed")?;

    Ok(())
}

/// Resolve once SIGTERM or SIGINT is received
///
/// Handlers are installed before returning so a failure surfaces at startup.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl std::future::Future<Output = ()>> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
    })
}

/// Resolve once CTRL-C is received
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl std::future::Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal: CTRL-C"),
            Err(e) => error!("Failed to wait for CTRL-C: {}", e),
        }
    })
}
