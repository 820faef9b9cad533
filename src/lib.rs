//! pkgcache - on-demand package tarball cache
//!
//! Resolves a package name and version to a local directory holding the
//! package's extracted files. Tarballs are fetched and unpacked once per
//! package; concurrent requests for the same package share that work.
//!
//! ```rust,ignore
//! use pkgcache::{Config, PackageCache, PackageIdentity};
//!
//! let cache = PackageCache::from_config(&Config::default());
//! let identity = PackageIdentity::new("react", "18.2.0")?;
//! let dir = cache
//!     .resolve(&identity, "https://registry.npmjs.org/react/-/react-18.2.0.tgz")
//!     .await?;
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod ui;

pub use cache::{CacheKey, CacheState, KeyedMutex, Origin, PackageCache, PackageIdentity, Resolution};
pub use config::{Config, ConfigManager};
pub use error::{PkgcacheError, PkgcacheResult};
pub use fetch::{TarballSource, UrlSource};
