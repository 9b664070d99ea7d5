//! # Settings
//!
//! Process configuration loaded from a YAML file keyed under
//! `configserver:`, with environment overrides for the values that must
//! not live on disk (the vault master key) and deployment conveniences
//! (the port).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::constants::{DEFAULT_CACHE_TTL_SECS, DEFAULT_COMMIT_HISTORY_SIZE, DEFAULT_SERVER_PORT};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Root directory holding one subdirectory per namespace. Must exist
    /// at startup; the process exits non-zero otherwise.
    pub base_path: PathBuf,

    /// Base64-encoded 256-bit vault master key. The `VAULT_MASTER_KEY`
    /// environment variable overrides this and is preferred.
    #[serde(default)]
    pub vault_master_key: Option<String>,

    /// Commits returned by history and event queries.
    #[serde(default = "default_commit_history_size")]
    pub commit_history_size: usize,

    /// Cache entry time-to-live in seconds.
    #[serde(rename = "cacheTTL", default = "default_cache_ttl")]
    pub cache_ttl: u64,

    /// Namespace to refresh-callback URL. Namespaces without an entry get
    /// a no-op (immediate SUCCESS) notification.
    #[serde(default)]
    pub refresh_notify_url: HashMap<String, String>,

    /// HTTP port for the management and resolver APIs.
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize)]
struct RootConfig {
    configserver: Settings,
}

fn default_commit_history_size() -> usize {
    DEFAULT_COMMIT_HISTORY_SIZE
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_port() -> u16 {
    DEFAULT_SERVER_PORT
}

impl Settings {
    /// Load settings from a YAML file and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let root: RootConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        let mut settings = root.configserver;
        settings.port = env_var_or_default("PORT", settings.port);
        Ok(settings)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
