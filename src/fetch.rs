//! Tarball sources
//!
//! A `TarballSource` turns a tarball URL into a byte stream. The default
//! `UrlSource` serves `http(s)://` through a `ureq` agent and `file://`
//! from local disk. Sources are blocking; callers run them on the blocking
//! thread pool.

use crate::config::FetchConfig;
use crate::error::{PkgcacheError, PkgcacheResult};
use crate::extract::{extract, ExtractSummary};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Something that can open a tarball URL as a byte stream
pub trait TarballSource: Send + Sync {
    /// Open `url` for reading.
    ///
    /// A non-success response must be reported as an error here rather
    /// than returned as a readable body.
    fn open(&self, url: &str) -> PkgcacheResult<Box<dyn Read + Send>>;
}

/// Default source: HTTP(S) via `ureq`, plus `file://` URLs
pub struct UrlSource {
    agent: ureq::Agent,
}

impl UrlSource {
    /// Create a source using the fetch settings from configuration
    pub fn new(config: &FetchConfig) -> Self {
        let timeout = (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs));
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .into();
        Self { agent }
    }

    fn open_http(&self, url: &str) -> PkgcacheResult<Box<dyn Read + Send>> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| PkgcacheError::transfer(url, e.to_string()))?;
        debug!(status = %response.status(), "Fetched {}", url);
        Ok(Box::new(response.into_body().into_reader()))
    }

    fn open_file(url: &str, path: &str) -> PkgcacheResult<Box<dyn Read + Send>> {
        let file = File::open(path).map_err(|e| PkgcacheError::transfer(url, e.to_string()))?;
        Ok(Box::new(file))
    }
}

impl Default for UrlSource {
    fn default() -> Self {
        Self::new(&FetchConfig::default())
    }
}

impl TarballSource for UrlSource {
    fn open(&self, url: &str) -> PkgcacheResult<Box<dyn Read + Send>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            self.open_http(url)
        } else if let Some(path) = url.strip_prefix("file://") {
            Self::open_file(url, path)
        } else {
            Err(PkgcacheError::UnsupportedUrl(url.to_string()))
        }
    }
}

/// Reader that remembers whether the underlying transfer failed
struct TransferReader<R> {
    inner: R,
    failed: Arc<AtomicBool>,
}

impl<R: Read> Read for TransferReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).inspect_err(|e| {
            if e.kind() != io::ErrorKind::Interrupted {
                self.failed.store(true, Ordering::SeqCst);
            }
        })
    }
}

/// Fetch `url` from `source` and extract it into `output_dir`.
///
/// Blocking. A failure while reading the transfer stream is reported as
/// `Transfer`; every other extraction failure stays `Archive`.
pub fn fetch_and_extract(
    source: &dyn TarballSource,
    url: &str,
    output_dir: &Path,
) -> PkgcacheResult<ExtractSummary> {
    info!("Fetching {} and extracting to {}", url, output_dir.display());

    let body = source.open(url)?;
    let failed = Arc::new(AtomicBool::new(false));
    let reader = TransferReader {
        inner: body,
        failed: Arc::clone(&failed),
    };

    extract(reader, output_dir).map_err(|e| match e {
        PkgcacheError::Archive { source, .. } if failed.load(Ordering::SeqCst) => {
            PkgcacheError::transfer(url, format!("stream interrupted: {}", source))
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct BrokenStream;

    impl Read for BrokenStream {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer hung up"))
        }
    }

    struct StaticSource(Vec<u8>);

    impl TarballSource for StaticSource {
        fn open(&self, _url: &str) -> PkgcacheResult<Box<dyn Read + Send>> {
            Ok(Box::new(io::Cursor::new(self.0.clone())))
        }
    }

    struct BrokenSource;

    impl TarballSource for BrokenSource {
        fn open(&self, _url: &str) -> PkgcacheResult<Box<dyn Read + Send>> {
            Ok(Box::new(BrokenStream))
        }
    }

    #[test]
    fn unsupported_scheme() {
        let source = UrlSource::default();
        let result = source.open("ftp://example.test/pkg.tgz");
        assert!(matches!(result, Err(PkgcacheError::UnsupportedUrl(_))));
    }

    #[test]
    fn missing_file_is_transfer_error() {
        let temp = TempDir::new().unwrap();
        let url = format!("file://{}", temp.path().join("absent.tgz").display());

        let result = UrlSource::default().open(&url);

        assert!(matches!(result, Err(PkgcacheError::Transfer { .. })));
    }

    #[test]
    fn file_url_is_readable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pkg.tgz");
        std::fs::write(&path, b"bytes").unwrap();

        let mut reader = UrlSource::default()
            .open(&format!("file://{}", path.display()))
            .unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();

        assert_eq!(out, b"bytes");
    }

    #[test]
    fn interrupted_stream_is_transfer_error() {
        let temp = TempDir::new().unwrap();
        let result = fetch_and_extract(&BrokenSource, "https://x.test/a.tgz", temp.path());
        assert!(matches!(result, Err(PkgcacheError::Transfer { .. })));
    }

    #[test]
    fn malformed_body_is_archive_error() {
        let temp = TempDir::new().unwrap();
        let mut body = vec![0x1f, 0x8b];
        body.extend_from_slice(b"garbage");

        let result = fetch_and_extract(&StaticSource(body), "https://x.test/a.tgz", temp.path());

        assert!(matches!(result, Err(PkgcacheError::Archive { .. })));
    }
}
