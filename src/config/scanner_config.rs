//! Scanner Configuration - identity, service endpoint and delivery tuning
//!
//! Every section is `#[serde(default)]`, so a partial (or empty) TOML file is
//! valid. Values a user cannot sensibly mean (zero capacity, blank URL) are
//! corrected by `apply_defaults()`; anything left inconsistent is reported by
//! `validate()`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::defaults::*;
use crate::transport::client::normalize_base_url;
use crate::transport::{BackoffPolicy, ExponentialBackoff, FixedBackoff};

/// Environment variable pointing at a config file.
pub const CONFIG_ENV_VAR: &str = "PRICEBOOK_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "pricebook.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `ScannerConfig::load()` which searches:
/// 1. `$PRICEBOOK_CONFIG` env var
/// 2. `./pricebook.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScannerConfig {
    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub scanner: ScanConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,
}

impl ScannerConfig {
    /// Load configuration using the standard search order.
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), sender = %config.identity.sender_id, "Loaded config from {CONFIG_ENV_VAR}");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {CONFIG_ENV_VAR}, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV_VAR} points to non-existent file, falling back");
            }
        }

        // 2. Check ./pricebook.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(sender = %config.identity.sender_id, "Loaded config from ./{LOCAL_CONFIG_FILE}");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{LOCAL_CONFIG_FILE}, using defaults");
                }
            }
        }

        // 3. Defaults
        info!("No {LOCAL_CONFIG_FILE} found, using built-in defaults");
        let mut config = Self::default();
        config.apply_defaults();
        config
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let mut config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, creating it with defaults (and a fresh sender id) when
    /// missing. A sender id generated for a file that lacked one is written
    /// back so the identity survives restarts.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let mut config = Self::default();
            config.apply_defaults();
            config.save_to_file(path)?;
            info!(path = %path.display(), sender = %config.identity.sender_id, "Created default config");
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let mut config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        let had_sender = !config.identity.sender_id.trim().is_empty();
        config.apply_defaults();
        config.validate()?;
        if !had_sender {
            if let Err(e) = config.save_to_file(path) {
                warn!(error = %e, "Could not persist generated sender id");
            }
        }
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        }
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Replace blank or out-of-range values with their defaults.
    pub fn apply_defaults(&mut self) {
        if self.identity.sender_id.trim().is_empty() {
            self.identity.sender_id = generate_sender_id();
        } else {
            self.identity.sender_id = self.identity.sender_id.trim().to_string();
        }

        if self.scanner.flush_interval_ticks == 0 {
            self.scanner.flush_interval_ticks = DEFAULT_FLUSH_INTERVAL_TICKS;
        }
        if self.scanner.max_queued_scans == 0 {
            self.scanner.max_queued_scans = DEFAULT_MAX_QUEUED_SCANS;
        }
        if self.delivery.reconnect_backoff_secs == 0 {
            self.delivery.reconnect_backoff_secs = 1;
        }

        match normalize_base_url(&self.service.api_base_url) {
            Ok(url) => self.service.api_base_url = url,
            Err(e) => {
                error!(error = %e, fallback = DEFAULT_API_BASE_URL, "Invalid API base URL, falling back to default");
                self.service.api_base_url = DEFAULT_API_BASE_URL.to_string();
            }
        }
    }

    /// Validate values for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.identity.sender_id.trim().is_empty() {
            errors.push("identity.sender_id must not be blank".to_string());
        }
        if normalize_base_url(&self.service.api_base_url).is_err() {
            errors.push(format!(
                "service.api_base_url '{}' must be an http(s) URL with a host",
                self.service.api_base_url
            ));
        }
        if self.service.request_timeout_secs == 0 {
            errors.push("service.request_timeout_secs must be > 0".to_string());
        }
        if self.service.connect_timeout_secs == 0 {
            errors.push("service.connect_timeout_secs must be > 0".to_string());
        }
        if self.service.bootstrap_page_size == 0 {
            errors.push("service.bootstrap_page_size must be > 0".to_string());
        }
        if self.scanner.max_queued_scans == 0 {
            errors.push("scanner.max_queued_scans must be > 0".to_string());
        }
        if self.scanner.flush_interval_ticks == 0 {
            errors.push("scanner.flush_interval_ticks must be > 0".to_string());
        }
        if self.delivery.max_attempts == 0 {
            errors.push("delivery.max_attempts must be > 0".to_string());
        }
        if self.delivery.reconnect_backoff_secs == 0 {
            errors.push("delivery.reconnect_backoff_secs must be > 0".to_string());
        }
        if self.delivery.backoff == BackoffKind::Exponential
            && self.delivery.max_backoff_secs < self.delivery.reconnect_backoff_secs
        {
            errors.push(format!(
                "delivery.max_backoff_secs ({}) must be >= reconnect_backoff_secs ({})",
                self.delivery.max_backoff_secs, self.delivery.reconnect_backoff_secs
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// `<user>-<uuid>`, user taken from the environment.
pub fn generate_sender_id() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "player".to_string());
    format!("{}-{}", user, Uuid::new_v4())
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Sections
// ============================================================================

/// Who is reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IdentityConfig {
    /// Sender id attached to every scan. Generated when blank.
    #[serde(default)]
    pub sender_id: String,
}

/// Scan cadence and buffering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanConfig {
    /// Master switch; when off, chunk scans are ignored.
    pub enabled: bool,
    /// Host ticks between scan buffer flushes.
    pub flush_interval_ticks: u32,
    /// Scan buffer capacity; the oldest batch is dropped when full.
    pub max_queued_scans: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            flush_interval_ticks: DEFAULT_FLUSH_INTERVAL_TICKS,
            max_queued_scans: DEFAULT_MAX_QUEUED_SCANS,
        }
    }
}

/// Pricebook service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub bootstrap_page_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            bootstrap_page_size: DEFAULT_BOOTSTRAP_PAGE_SIZE,
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Retry behaviour after a failed send.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Wait `reconnect_backoff_secs` after every failure.
    #[default]
    Fixed,
    /// Double the wait per consecutive failure, capped, with jitter.
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeliveryConfig {
    pub max_attempts: u32,
    pub reconnect_backoff_secs: u64,
    pub backoff: BackoffKind,
    pub max_backoff_secs: u64,
    pub backoff_jitter_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            reconnect_backoff_secs: DEFAULT_RECONNECT_BACKOFF_SECS,
            backoff: BackoffKind::Fixed,
            max_backoff_secs: DEFAULT_MAX_BACKOFF_SECS,
            backoff_jitter_secs: DEFAULT_BACKOFF_JITTER_SECS,
        }
    }
}

impl DeliveryConfig {
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs.max(1))
    }

    /// Build the configured backoff policy.
    pub fn backoff_policy(&self) -> std::sync::Arc<dyn BackoffPolicy> {
        match self.backoff {
            BackoffKind::Fixed => std::sync::Arc::new(FixedBackoff::new(self.reconnect_backoff())),
            BackoffKind::Exponential => std::sync::Arc::new(ExponentialBackoff::new(
                self.reconnect_backoff(),
                Duration::from_secs(self.max_backoff_secs),
                Duration::from_secs(self.backoff_jitter_secs),
            )),
        }
    }
}
