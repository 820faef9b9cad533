//! Configuration schema for pkgcache
//!
//! Configuration is stored at `~/.config/pkgcache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "NPM_PACKAGE_CACHE_DIR";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache directory settings
    pub cache: CacheConfig,

    /// Tarball download settings
    pub fetch: FetchConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root; falls back to NPM_PACKAGE_CACHE_DIR, then the system
    /// temp directory
    pub root: Option<PathBuf>,

    /// Prefix for cache directory names
    pub prefix: String,

    /// Write a marker after extraction and require it for a cache hit
    pub completion_marker: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            prefix: "pkgcache".to_string(),
            completion_marker: false,
        }
    }
}

/// Check a cache directory prefix.
///
/// Prefixes are a single path segment of letters, digits, `_` and `.`.
/// No `-`, so one prefix is never the start of another prefix's
/// `{prefix}-` directories.
pub fn validate_prefix(prefix: &str) -> Result<(), String> {
    let valid = !prefix.is_empty()
        && !prefix.starts_with('.')
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(format!(
            "invalid cache prefix {:?}: use letters, digits, '_' and '.' (not leading)",
            prefix
        ))
    }
}

impl Config {
    /// Check values serde cannot
    pub fn validate(&self) -> Result<(), String> {
        validate_prefix(&self.cache.prefix)
    }
}

impl CacheConfig {
    /// Resolve the effective cache root.
    ///
    /// Order: `NPM_PACKAGE_CACHE_DIR`, then `root`, then the platform's
    /// temporary directory.
    pub fn resolve_root(&self) -> PathBuf {
        if let Some(dir) = std::env::var_os(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(dir);
        }
        self.root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Tarball download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Overall timeout per download in seconds (0 disables)
    pub timeout_secs: u64,

    /// User-Agent header sent with requests
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            user_agent: concat!("pkgcache/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
