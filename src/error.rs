//! Error types for pkgcache
//!
//! All modules use `PkgcacheResult<T>` as their return type. Errors are
//! `Clone` because a single failure is fanned out to every caller waiting
//! on the same cache key; I/O sources are therefore held behind `Arc`.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for pkgcache operations
pub type PkgcacheResult<T> = Result<T, PkgcacheError>;

/// All errors that can occur in pkgcache
#[derive(Error, Debug, Clone)]
pub enum PkgcacheError {
    // Package identity errors
    #[error("Invalid package name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Invalid version '{version}' for package {name}: {reason}")]
    InvalidVersion {
        name: String,
        version: String,
        reason: String,
    },

    // Transfer errors
    #[error("Failed to fetch {url}: {reason}")]
    Transfer { url: String, reason: String },

    #[error("Unsupported tarball URL: {0}")]
    UnsupportedUrl(String),

    // Archive errors
    #[error("Failed to unpack archive into {dir}: {source}")]
    Archive {
        dir: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    // Cache directory errors
    #[error("Filesystem error: {context}: {source}")]
    Filesystem {
        context: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("In-flight operation for {key} ended without a result")]
    Aborted { key: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(Arc<serde_json::Error>),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(String),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl From<serde_json::Error> for PkgcacheError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(Arc::new(e))
    }
}

impl From<toml::ser::Error> for PkgcacheError {
    fn from(e: toml::ser::Error) -> Self {
        Self::TomlSerialize(e.to_string())
    }
}

impl PkgcacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    /// Create a cache directory error with context
    pub fn filesystem(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Filesystem {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    /// Create an archive error for the given output directory
    pub fn archive(dir: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Archive {
            dir: dir.into(),
            source: Arc::new(source),
        }
    }

    /// Create a transfer error
    pub fn transfer(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transfer {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Name of the stage that failed, for user-facing reports
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidName { .. } | Self::InvalidVersion { .. } => "package",
            Self::Transfer { .. } | Self::UnsupportedUrl(_) => "transfer",
            Self::Archive { .. } => "archive",
            Self::Filesystem { .. } => "filesystem",
            Self::Aborted { .. } | Self::Internal(_) => "internal",
            Self::ConfigInvalid { .. } | Self::ConfigDirCreate { .. } => "config",
            Self::Io { .. } | Self::Json(_) | Self::TomlSerialize(_) | Self::User(_) => "cli",
        }
    }

    /// Check if error is retryable
    ///
    /// The cache itself never retries; this only informs callers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transfer { .. } | Self::Aborted { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Transfer { .. } => Some("Check the tarball URL and network connectivity"),
            Self::UnsupportedUrl(_) => Some("Use an http://, https:// or file:// URL"),
            Self::Archive { .. } => Some(
                "The partially extracted directory is left in place; remove it before retrying",
            ),
            Self::Filesystem { .. } => {
                Some("Check permissions on the cache root, or set NPM_PACKAGE_CACHE_DIR")
            }
            _ => None,
        }
    }
}
