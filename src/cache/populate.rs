//! Fetch-and-populate coordinator
//!
//! `PackageCache` maps a package identity to its cache directory and makes
//! sure that directory is populated, fetching and extracting the tarball at
//! most once per key no matter how many callers ask concurrently.

use crate::cache::key::{CacheKey, PackageIdentity};
use crate::cache::mutex::KeyedMutex;
use crate::cache::state::{self, CacheEntry, CacheState, CompletionMarker};
use crate::config::Config;
use crate::error::{PkgcacheError, PkgcacheResult};
use crate::fetch::{fetch_and_extract, TarballSource, UrlSource};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// How a resolved directory came to be available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// The directory was already present
    CacheHit,
    /// The tarball was fetched and extracted by this operation
    Fetched,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheHit => write!(f, "cached"),
            Self::Fetched => write!(f, "fetched"),
        }
    }
}

/// Outcome of a resolve, shared by every caller of the same operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub path: PathBuf,
    pub origin: Origin,
}

/// On-disk package cache with deduplicated population
pub struct PackageCache {
    root: PathBuf,
    prefix: String,
    completion_marker: bool,
    source: Arc<dyn TarballSource>,
    inflight: KeyedMutex<Resolution>,
}

impl PackageCache {
    /// Create a cache under `root` that fetches through `source`
    pub fn new(root: impl Into<PathBuf>, source: Arc<dyn TarballSource>) -> Self {
        Self {
            root: root.into(),
            prefix: crate::config::CacheConfig::default().prefix,
            completion_marker: false,
            source,
            inflight: KeyedMutex::new(),
        }
    }

    /// Place the cache under a different root
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Create a cache from configuration, using the default URL source
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.cache.resolve_root(),
            Arc::new(UrlSource::new(&config.fetch)),
        )
        .with_prefix(config.cache.prefix.clone())
        .with_completion_marker(config.cache.completion_marker)
    }

    /// Set the directory name prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Require a completion marker for cache hits
    pub fn with_completion_marker(mut self, enabled: bool) -> Self {
        self.completion_marker = enabled;
        self
    }

    /// Cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Derive the cache key for a package (no I/O)
    pub fn key_for(&self, identity: &PackageIdentity) -> CacheKey {
        CacheKey::derive(&self.root, &self.prefix, identity)
    }

    /// Current on-disk state for a package
    pub async fn state(&self, identity: &PackageIdentity) -> PkgcacheResult<CacheState> {
        state::probe(self.key_for(identity).path(), self.completion_marker).await
    }

    /// List cache directories under the root
    pub async fn list(&self) -> PkgcacheResult<Vec<CacheEntry>> {
        state::list_entries(&self.root, &self.prefix, self.completion_marker).await
    }

    /// Number of packages currently being populated
    pub fn in_flight(&self) -> usize {
        self.inflight.in_flight()
    }

    /// Resolve a package to its populated cache directory
    pub async fn resolve(
        &self,
        identity: &PackageIdentity,
        tarball_url: &str,
    ) -> PkgcacheResult<PathBuf> {
        self.ensure(identity, tarball_url)
            .await
            .map(|resolution| resolution.path)
    }

    /// Resolve a package, reporting whether it was fetched or already cached.
    ///
    /// Concurrent calls for the same package share one population and
    /// all receive its outcome.
    pub async fn ensure(
        &self,
        identity: &PackageIdentity,
        tarball_url: &str,
    ) -> PkgcacheResult<Resolution> {
        let key = self.key_for(identity);
        let populate = Populate {
            dir: key.path().to_path_buf(),
            identity: identity.clone(),
            url: tarball_url.to_string(),
            source: Arc::clone(&self.source),
            completion_marker: self.completion_marker,
        };

        self.inflight.run(key.as_str(), move || populate.run()).await
    }
}

impl fmt::Debug for PackageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageCache")
            .field("root", &self.root)
            .field("prefix", &self.prefix)
            .field("completion_marker", &self.completion_marker)
            .field("in_flight", &self.inflight.in_flight())
            .finish()
    }
}

/// A single population attempt for one cache directory
struct Populate {
    dir: PathBuf,
    identity: PackageIdentity,
    url: String,
    source: Arc<dyn TarballSource>,
    completion_marker: bool,
}

impl Populate {
    async fn run(self) -> PkgcacheResult<Resolution> {
        match state::probe(&self.dir, self.completion_marker).await? {
            CacheState::Complete => {
                debug!("Cache hit for {} at {}", self.identity, self.dir.display());
                return Ok(Resolution {
                    path: self.dir,
                    origin: Origin::CacheHit,
                });
            }
            CacheState::Building => {
                warn!(
                    "Discarding incomplete cache directory {}",
                    self.dir.display()
                );
                fs::remove_dir_all(&self.dir).await.map_err(|e| {
                    PkgcacheError::filesystem(
                        format!("removing incomplete cache directory {}", self.dir.display()),
                        e,
                    )
                })?;
            }
            CacheState::Miss => {}
        }

        fs::create_dir_all(&self.dir).await.map_err(|e| {
            PkgcacheError::filesystem(
                format!("creating cache directory {}", self.dir.display()),
                e,
            )
        })?;

        let source = Arc::clone(&self.source);
        let url = self.url.clone();
        let dir = self.dir.clone();
        let summary =
            tokio::task::spawn_blocking(move || fetch_and_extract(source.as_ref(), &url, &dir))
                .await
                .map_err(|e| PkgcacheError::Internal(format!("extraction task failed: {}", e)))??;

        if self.completion_marker {
            CompletionMarker::new(&self.identity)
                .write(&self.dir)
                .await?;
        }

        info!(
            files = summary.files,
            skipped_links = summary.skipped_links,
            "Cached {} at {}",
            self.identity,
            self.dir.display()
        );
        Ok(Resolution {
            path: self.dir,
            origin: Origin::Fetched,
        })
    }
}
