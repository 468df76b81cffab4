use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Retry policy parameters (`[retry]` in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per call (including the first).
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds, also caps `Retry-After`.
    pub max_delay_ms: u64,
    /// Honor the server's `Retry-After` on 429 responses.
    pub respect_retry_after: bool,
    /// Add +/-10% random jitter to computed backoff.
    pub jitter: bool,
    /// Retry failures where no response came back (connect, DNS, timeout).
    pub retry_transport_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            respect_retry_after: true,
            jitter: true,
            retry_transport_errors: false,
        }
    }
}

/// Request/response logging switches (`[logging]` in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub log_requests: bool,
    pub log_responses: bool,
    pub log_retries: bool,
    /// Key fragments whose values are masked (case-insensitive substring match).
    pub sensitive_keys: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_requests: true,
            log_responses: true,
            log_retries: true,
            sensitive_keys: [
                "api-key",
                "api_key",
                "apikey",
                "authorization",
                "token",
                "secret",
                "password",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Global configuration loaded from `~/.config/vox/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoxConfig {
    /// API root, e.g. `https://api.elevenlabs.io`.
    pub base_url: String,
    /// Sent as the `xi-api-key` header when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for VoxConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".to_string(),
            api_key: None,
            timeout_secs: 30,
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("vox")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<VoxConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = VoxConfig::default();
        save_to(&path, &default_cfg)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load configuration from an explicit path.
pub fn load_from(path: &Path) -> Result<VoxConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: VoxConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}

pub fn save_to(path: &Path, cfg: &VoxConfig) -> Result<()> {
    let toml = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, toml).with_context(|| format!("writing config {}", path.display()))?;
    Ok(())
}
