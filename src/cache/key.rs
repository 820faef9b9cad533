//! Package identity and cache key derivation
//!
//! A cache key is a pure function of the cache root, the directory prefix
//! and the package's name and version. The key string doubles as the
//! on-disk directory path: `<root>/<prefix>-<name>@<version>`, where path
//! separators in the name (the `/` of a scoped name) become `+`.

use crate::error::{PkgcacheError, PkgcacheResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Longest package name accepted by the npm registry
const MAX_NAME_LEN: usize = 214;

/// Replacement for path separators in a package name
const SEPARATOR_REPLACEMENT: char = '+';

/// A package name and version, validated on construction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageIdentity {
    name: String,
    version: String,
}

impl PackageIdentity {
    /// Validate and create a package identity
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> PkgcacheResult<Self> {
        let name = name.into();
        let version = version.into();

        validate_name(&name)?;
        semver::Version::parse(&version).map_err(|e| PkgcacheError::InvalidVersion {
            name: name.clone(),
            version: version.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self { name, version })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Filesystem-safe form of the name (no path separators)
    pub fn sanitized_name(&self) -> String {
        sanitize_name(&self.name)
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

fn invalid_name(name: &str, reason: &str) -> PkgcacheError {
    PkgcacheError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Validate that a package name is safe to embed in a directory name.
///
/// Scoped names (`@scope/pkg`) carry exactly one `/`; unscoped names none.
/// `@` may only lead the name, which keeps the `name@version` segment
/// unambiguous.
fn validate_name(name: &str) -> PkgcacheResult<()> {
    if name.is_empty() {
        return Err(invalid_name(name, "name cannot be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid_name(name, "name exceeds 214 characters"));
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '\\' || c == SEPARATOR_REPLACEMENT)
    {
        return Err(invalid_name(
            name,
            "must not contain whitespace, control characters, '\\' or '+'",
        ));
    }
    if name.chars().skip(1).any(|c| c == '@') {
        return Err(invalid_name(name, "'@' is only allowed as the scope marker"));
    }

    let segments: Vec<&str> = name.split('/').collect();
    let scoped = name.starts_with('@');
    match (scoped, segments.len()) {
        (true, 2) | (false, 1) => {}
        (true, _) => return Err(invalid_name(name, "scoped names must look like @scope/name")),
        (false, _) => return Err(invalid_name(name, "unscoped names must not contain '/'")),
    }

    for segment in segments {
        let bare = segment.trim_start_matches('@');
        if bare.is_empty() || bare == "." || bare == ".." {
            return Err(invalid_name(name, "empty, '.' or '..' name segment"));
        }
    }

    Ok(())
}

/// Replace path separators so the name forms a single path segment
fn sanitize_name(name: &str) -> String {
    name.replace(['/', '\\'], &SEPARATOR_REPLACEMENT.to_string())
}

/// Deterministic cache key, also the cache directory path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    path: PathBuf,
    key: String,
}

impl CacheKey {
    /// Derive the cache key for a package under a cache root
    pub fn derive(root: &Path, prefix: &str, identity: &PackageIdentity) -> Self {
        let path = root.join(Self::dir_name(prefix, identity));
        let key = path.to_string_lossy().into_owned();
        Self { path, key }
    }

    /// Directory name (final path segment) for a package
    pub fn dir_name(prefix: &str, identity: &PackageIdentity) -> String {
        format!(
            "{}-{}@{}",
            prefix,
            identity.sanitized_name(),
            identity.version()
        )
    }

    /// Key string used by the in-flight registry
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Cache directory path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}
