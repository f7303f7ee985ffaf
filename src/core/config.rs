//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.sift/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SiftConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    pub url: Option<String>,
    pub path: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ReconnectConfig {
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    /// 0 means retry forever.
    pub max_attempts: Option<u32>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_SOCKET_PATH: &str = "socket.io";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RECONNECT_INITIAL_MS: u64 = 1000;
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 5000;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

/// Backoff schedule between connection attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(DEFAULT_RECONNECT_INITIAL_MS),
            max_delay: Duration::from_millis(DEFAULT_RECONNECT_MAX_MS),
            max_attempts: None,
        }
    }
}

/// Everything the transport needs to reach the agent server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub server_url: String,
    pub socket_path: String,
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub server_url: String,
    pub connection: ConnectionSettings,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.sift/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".sift").join("config.toml"))
}

/// Load config from `~/.sift/config.toml`, generating a commented default
/// if it doesn't exist yet.
pub fn load_config() -> Result<SiftConfig, ConfigError> {
    match config_path() {
        Some(path) => {
            if !path.exists() {
                info!("No config file found, generating default at {}", path.display());
                generate_default_config(&path);
                return Ok(SiftConfig::default());
            }
            load_config_from(&path)
        }
        None => {
            warn!("Could not determine home directory, using default config");
            Ok(SiftConfig::default())
        }
    }
}

/// Load config from an explicit path. A missing file is an error here.
pub fn load_config_from(path: &Path) -> Result<SiftConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: SiftConfig = toml::from_str(&contents)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# Sift Configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [server]
# url = "http://127.0.0.1:5000"      # Or set SIFT_SERVER_URL, or pass --server
# path = "socket.io"
# connect_timeout_secs = 10

# [reconnect]
# initial_delay_ms = 1000
# max_delay_ms = 5000
# max_attempts = 0                   # 0 = retry forever
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// `cli_server` is the `--server` flag (None = not specified).
pub fn resolve(config: &SiftConfig, cli_server: Option<&str>) -> ResolvedConfig {
    resolve_with_env(config, cli_server, std::env::var("SIFT_SERVER_URL").ok())
}

fn resolve_with_env(
    config: &SiftConfig,
    cli_server: Option<&str>,
    env_server: Option<String>,
) -> ResolvedConfig {
    // Server URL: CLI → env → config → default
    let server_url = cli_server
        .map(|s| s.to_string())
        .or(env_server)
        .or_else(|| config.server.url.clone())
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
    let server_url = server_url.trim_end_matches('/').to_string();

    let socket_path = config
        .server
        .path
        .as_deref()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_SOCKET_PATH)
        .to_string();

    let connect_timeout = Duration::from_secs(
        config
            .server
            .connect_timeout_secs
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
    );

    let initial_delay = Duration::from_millis(
        config
            .reconnect
            .initial_delay_ms
            .unwrap_or(DEFAULT_RECONNECT_INITIAL_MS),
    );
    // Max delay is never below the initial delay.
    let max_delay = Duration::from_millis(
        config
            .reconnect
            .max_delay_ms
            .unwrap_or(DEFAULT_RECONNECT_MAX_MS),
    )
    .max(initial_delay);

    ResolvedConfig {
        server_url: server_url.clone(),
        connection: ConnectionSettings {
            server_url,
            socket_path,
            connect_timeout,
            reconnect: ReconnectPolicy {
                initial_delay,
                max_delay,
                max_attempts: config.reconnect.max_attempts.filter(|&n| n > 0),
            },
        },
    }
}
