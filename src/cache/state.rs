//! Cache directory state
//!
//! Directory existence is the cache-hit signal. When completion markers are
//! enabled, a directory only counts as complete once the marker written
//! after a successful extraction is present; without the marker it is an
//! interrupted population (`Building`).

use crate::cache::key::PackageIdentity;
use crate::error::{PkgcacheError, PkgcacheResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// File written into a cache directory after a successful extraction
pub const COMPLETION_MARKER: &str = ".pkgcache-complete";

/// State of a cache directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    /// Directory absent or unusable (will be populated)
    Miss,
    /// Directory exists but population never finished
    Building,
    /// Directory is populated
    Complete,
}

impl CacheState {
    /// Whether a request for this directory is served without fetching
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Miss => write!(f, "miss"),
            Self::Building => write!(f, "building"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Contents of the completion marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMarker {
    pub name: String,
    pub version: String,
    pub completed_at: DateTime<Utc>,
}

impl CompletionMarker {
    /// Marker for a package populated just now
    pub fn new(identity: &PackageIdentity) -> Self {
        Self {
            name: identity.name().to_string(),
            version: identity.version().to_string(),
            completed_at: Utc::now(),
        }
    }

    /// Write the marker into a populated cache directory
    pub async fn write(&self, dir: &Path) -> PkgcacheResult<()> {
        let path = dir.join(COMPLETION_MARKER);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content).await.map_err(|e| {
            PkgcacheError::filesystem(format!("writing completion marker {}", path.display()), e)
        })?;
        debug!("Marked {} complete", dir.display());
        Ok(())
    }

    /// Read the marker from a cache directory, if present and well formed
    pub async fn read(dir: &Path) -> PkgcacheResult<Option<Self>> {
        let path = dir.join(COMPLETION_MARKER);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PkgcacheError::filesystem(
                    format!("reading completion marker {}", path.display()),
                    e,
                ))
            }
        };

        match serde_json::from_str(&content) {
            Ok(marker) => Ok(Some(marker)),
            Err(e) => {
                warn!("Ignoring malformed completion marker {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }
}

/// "Not present" conditions: the package has not been fetched yet
fn is_not_present(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

/// Determine the state of a cache directory.
///
/// A path that exists but is not a directory reports `Miss`; creating the
/// directory afterwards surfaces the conflict as a filesystem error. Any
/// probe failure other than "not present" is returned as an error.
pub async fn probe(dir: &Path, completion_marker: bool) -> PkgcacheResult<CacheState> {
    match fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => {
            if !completion_marker {
                return Ok(CacheState::Complete);
            }
            let marker = dir.join(COMPLETION_MARKER);
            match fs::metadata(&marker).await {
                Ok(_) => Ok(CacheState::Complete),
                Err(e) if is_not_present(&e) => Ok(CacheState::Building),
                Err(e) => Err(PkgcacheError::filesystem(
                    format!("checking completion marker {}", marker.display()),
                    e,
                )),
            }
        }
        Ok(_) => Ok(CacheState::Miss),
        Err(e) if is_not_present(&e) => Ok(CacheState::Miss),
        Err(e) => Err(PkgcacheError::filesystem(
            format!("checking cache directory {}", dir.display()),
            e,
        )),
    }
}

/// A cache directory found under the cache root
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    /// Directory name ({prefix}-{name}@{version})
    pub dir_name: String,
    /// Full path to the directory
    pub path: PathBuf,
    /// Current state of the directory
    pub state: CacheState,
    /// Completion marker, if one was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<CompletionMarker>,
}

/// List cache directories under `root` whose names start with `{prefix}-`.
///
/// A missing root yields an empty list.
pub async fn list_entries(
    root: &Path,
    prefix: &str,
    completion_marker: bool,
) -> PkgcacheResult<Vec<CacheEntry>> {
    let mut dir = match fs::read_dir(root).await {
        Ok(dir) => dir,
        Err(e) if is_not_present(&e) => return Ok(Vec::new()),
        Err(e) => {
            return Err(PkgcacheError::filesystem(
                format!("reading cache root {}", root.display()),
                e,
            ))
        }
    };

    let dir_prefix = format!("{}-", prefix);
    let mut entries = Vec::new();

    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|e| PkgcacheError::filesystem("reading cache root entry", e))?
    {
        let dir_name = entry.file_name().to_string_lossy().into_owned();
        if !dir_name.starts_with(&dir_prefix) {
            continue;
        }
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        if !is_dir {
            continue;
        }

        let path = entry.path();
        let marker = CompletionMarker::read(&path).await?;
        let state = match (&marker, completion_marker) {
            (Some(_), _) | (None, false) => CacheState::Complete,
            (None, true) => CacheState::Building,
        };

        entries.push(CacheEntry {
            dir_name,
            path,
            state,
            marker,
        });
    }

    entries.sort_by(|a, b| a.dir_name.cmp(&b.dir_name));
    Ok(entries)
}
