//! On-disk package cache
//!
//! Packages are cached as extracted directory trees, one per
//! `(name, version)`, under a single cache root. The directory path is the
//! cache key.
//!
//! # Population
//!
//! - Concurrent requests for one key share a single fetch (`KeyedMutex`)
//! - Directory existence is the cache-hit signal
//! - A failed population leaves whatever was written in place; the next
//!   request treats that directory as a hit unless completion markers are
//!   enabled
//!
//! # Cache States
//!
//! | State | Marker mode | Description |
//! |-------|-------------|-------------|
//! | Miss | any | No directory, will be populated |
//! | Building | on | Directory without marker, repopulated from scratch |
//! | Complete | any | Directory present (and marked, in marker mode) |

pub mod key;
pub mod mutex;
pub mod populate;
pub mod state;

pub use key::{CacheKey, PackageIdentity};
pub use mutex::KeyedMutex;
pub use populate::{Origin, PackageCache, Resolution};
pub use state::{list_entries, probe, CacheEntry, CacheState, CompletionMarker, COMPLETION_MARKER};
