//! Tarball extraction pipeline
//!
//! Turns an optionally gzip-compressed tar stream into a directory tree:
//!
//! 1. `decompress` sniffs the gzip magic and decodes, or passes through
//! 2. entries are parsed with the `tar` crate
//! 3. `rewrite_entry_path` strips the publisher's wrapper directory
//!    (`package/index.js` becomes `index.js`)
//! 4. `classify` drops links and special files; they are never created,
//!    and neither is anything at the completion marker's path
//! 5. `write_entry` writes files and directories, always readable
//!
//! The pipeline only succeeds once the input has been read to EOF, so the
//! gzip trailer is verified. It performs no caching or existence checks.

use crate::cache::state::COMPLETION_MARKER;
use crate::error::{PkgcacheError, PkgcacheResult};
use flate2::read::MultiGzDecoder;
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Entry, EntryType};
use tracing::{debug, trace, warn};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Permission bits kept from the archive (no setuid/setgid/sticky, no
/// group/other write)
const MODE_MASK: u32 = 0o755;

/// Bits OR-ed into every file so it is readable by all
const FILE_READABLE: u32 = 0o444;

/// Bits OR-ed into every directory: listable by all, and owner-writable so
/// an abandoned tree can still be removed
const DIR_READABLE: u32 = 0o755;

/// Counts of what an extraction wrote and skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: usize,
    pub directories: usize,
    /// Symbolic and hard links dropped
    pub skipped_links: usize,
    /// Entries whose rewritten path would leave the output directory
    pub skipped_unsafe: usize,
    /// Devices, fifos and other special entries
    pub skipped_other: usize,
}

/// What to do with an archive entry, by type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Write,
    SkipLink,
    SkipOther,
}

/// Decide whether an entry type is materialized
pub fn classify(entry_type: EntryType) -> Disposition {
    match entry_type {
        EntryType::Regular
        | EntryType::Continuous
        | EntryType::GNUSparse
        | EntryType::Directory => Disposition::Write,
        EntryType::Symlink | EntryType::Link => Disposition::SkipLink,
        _ => Disposition::SkipOther,
    }
}

/// Wrap `reader` in a gzip decoder if the stream starts with the gzip
/// magic; otherwise return it unchanged.
pub fn decompress<'a, R: Read + 'a>(mut reader: R) -> io::Result<Box<dyn Read + 'a>> {
    let mut head = [0u8; 2];
    let mut len = 0;
    while len < head.len() {
        match reader.read(&mut head[len..]) {
            Ok(0) => break,
            Ok(n) => len += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    let stream = io::Cursor::new(head[..len].to_vec()).chain(reader);
    if head[..len] == GZIP_MAGIC {
        trace!("Input is gzip compressed");
        Ok(Box::new(MultiGzDecoder::new(stream)))
    } else {
        trace!("Input is not compressed");
        Ok(Box::new(stream))
    }
}

/// Strip the first path segment of a raw entry name.
///
/// Everything up to and including the first `/` is removed; a name
/// without `/` is kept. Returns `None` for the wrapper directory itself,
/// including spellings such as `package/./`.
pub fn rewrite_entry_path(raw: &[u8]) -> Option<PathBuf> {
    let stripped = match raw.iter().position(|&b| b == b'/') {
        Some(i) => &raw[i + 1..],
        None => raw,
    };
    let path = bytes_to_path(stripped);
    if path.components().all(|c| c == Component::CurDir) {
        return None;
    }
    Some(path)
}

#[cfg(unix)]
fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

/// Whether a relative path stays inside the directory it is joined to
pub fn is_contained(path: &Path) -> bool {
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    depth > 0
}

/// Whether a path falls under a name the cache writes itself
pub fn is_reserved(path: &Path) -> bool {
    path.components()
        .find(|c| !matches!(c, Component::CurDir))
        .is_some_and(|c| c.as_os_str() == COMPLETION_MARKER)
}

/// Extract an archive stream into an existing output directory
pub fn extract<R: Read>(reader: R, output_dir: &Path) -> PkgcacheResult<ExtractSummary> {
    let summary = unpack(reader, output_dir).map_err(|e| PkgcacheError::archive(output_dir, e))?;
    debug!(
        files = summary.files,
        directories = summary.directories,
        skipped_links = summary.skipped_links,
        skipped_unsafe = summary.skipped_unsafe,
        skipped_other = summary.skipped_other,
        "Extracted into {}",
        output_dir.display()
    );
    Ok(summary)
}

fn unpack<R: Read>(reader: R, output_dir: &Path) -> io::Result<ExtractSummary> {
    let mut archive = Archive::new(decompress(reader)?);
    let mut summary = ExtractSummary::default();
    let mut dir_modes = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let raw = entry.path_bytes().into_owned();
        let Some(relative) = rewrite_entry_path(&raw) else {
            continue;
        };

        match classify(entry.header().entry_type()) {
            Disposition::Write => {}
            Disposition::SkipLink => {
                debug!("Skipping link entry {}", relative.display());
                summary.skipped_links += 1;
                continue;
            }
            Disposition::SkipOther => {
                debug!(
                    entry_type = ?entry.header().entry_type(),
                    "Skipping special entry {}",
                    relative.display()
                );
                summary.skipped_other += 1;
                continue;
            }
        }

        if !is_contained(&relative) {
            warn!(
                "Skipping entry {} that escapes the output directory",
                String::from_utf8_lossy(&raw)
            );
            summary.skipped_unsafe += 1;
            continue;
        }

        if is_reserved(&relative) {
            warn!(
                "Skipping entry {} that shadows the completion marker",
                String::from_utf8_lossy(&raw)
            );
            summary.skipped_unsafe += 1;
            continue;
        }

        let target = output_dir.join(&relative);
        write_entry(&mut entry, &target, &mut dir_modes, &mut summary)?;
    }

    // Parents before children were created; loosen/tighten modes
    // bottom-up so a read-only directory never blocks its own contents.
    for (dir, mode) in dir_modes.iter().rev() {
        set_mode(dir, *mode)?;
    }

    // Drain trailing padding so the whole stream (and gzip CRC) is consumed.
    let mut rest = archive.into_inner();
    io::copy(&mut rest, &mut io::sink())?;

    Ok(summary)
}

/// Write one entry to `target`.
///
/// Directory permissions are deferred into `dir_modes`; file permissions
/// are applied immediately.
pub fn write_entry<R: Read>(
    entry: &mut Entry<'_, R>,
    target: &Path,
    dir_modes: &mut Vec<(PathBuf, u32)>,
    summary: &mut ExtractSummary,
) -> io::Result<()> {
    let mode = entry.header().mode()?;

    if entry.header().entry_type() == EntryType::Directory {
        fs::create_dir_all(target)?;
        dir_modes.push((target.to_path_buf(), (mode & MODE_MASK) | DIR_READABLE));
        summary.directories += 1;
        return Ok(());
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    entry.unpack(target)?;
    set_mode(target, (mode & MODE_MASK) | FILE_READABLE)?;
    trace!("Wrote {}", target.display());
    summary.files += 1;
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tar::{Builder, Header};
    use tempfile::TempDir;

    enum Item<'a> {
        File(&'a str, &'a [u8], u32),
        Dir(&'a str, u32),
        Symlink(&'a str, &'a str),
        HardLink(&'a str, &'a str),
        RawName(&'a [u8], &'a [u8]),
    }

    fn tarball(items: &[Item<'_>]) -> Vec<u8> {
        let mut builder = Builder::new(Vec::new());

        for item in items {
            let mut header = Header::new_gnu();
            match item {
                Item::File(path, content, mode) => {
                    header.set_path(path).unwrap();
                    header.set_size(content.len() as u64);
                    header.set_mode(*mode);
                    header.set_entry_type(EntryType::Regular);
                    header.set_cksum();
                    builder.append(&header, *content).unwrap();
                }
                Item::Dir(path, mode) => {
                    header.set_path(path).unwrap();
                    header.set_size(0);
                    header.set_mode(*mode);
                    header.set_entry_type(EntryType::Directory);
                    header.set_cksum();
                    builder.append(&header, io::empty()).unwrap();
                }
                Item::Symlink(path, target) | Item::HardLink(path, target) => {
                    let kind = if matches!(item, Item::Symlink(..)) {
                        EntryType::Symlink
                    } else {
                        EntryType::Link
                    };
                    header.set_path(path).unwrap();
                    header.set_size(0);
                    header.set_mode(0o777);
                    header.set_entry_type(kind);
                    header.set_link_name(target).unwrap();
                    header.set_cksum();
                    builder.append(&header, io::empty()).unwrap();
                }
                Item::RawName(name, content) => {
                    // Bypasses set_path, which refuses '..'
                    header.as_old_mut().name[..name.len()].copy_from_slice(name);
                    header.set_size(content.len() as u64);
                    header.set_mode(0o644);
                    header.set_entry_type(EntryType::Regular);
                    header.set_cksum();
                    builder.append(&header, *content).unwrap();
                }
            }
        }

        builder.into_inner().unwrap()
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn rewrite_strips_first_segment() {
        assert_eq!(
            rewrite_entry_path(b"package/index.js"),
            Some(PathBuf::from("index.js"))
        );
        assert_eq!(
            rewrite_entry_path(b"firebase_npm/lib/app.js"),
            Some(PathBuf::from("lib/app.js"))
        );
        assert_eq!(rewrite_entry_path(b"README"), Some(PathBuf::from("README")));
        assert_eq!(rewrite_entry_path(b"package/"), None);
        assert_eq!(rewrite_entry_path(b"package/."), None);
        assert_eq!(rewrite_entry_path(b"package/./"), None);
        assert_eq!(
            rewrite_entry_path(b"package/./lib"),
            Some(PathBuf::from("./lib"))
        );
    }

    #[test]
    fn containment() {
        assert!(is_contained(Path::new("lib/index.js")));
        assert!(is_contained(Path::new("./lib")));
        assert!(!is_contained(Path::new("../etc/passwd")));
        assert!(!is_contained(Path::new("lib/../../x")));
        assert!(!is_contained(Path::new("/etc/passwd")));
        assert!(!is_contained(Path::new(".")));
    }

    #[test]
    fn reserved_names() {
        assert!(is_reserved(Path::new(COMPLETION_MARKER)));
        assert!(is_reserved(Path::new("./.pkgcache-complete")));
        assert!(is_reserved(Path::new(".pkgcache-complete/inner")));
        assert!(!is_reserved(Path::new("lib/.pkgcache-complete")));
        assert!(!is_reserved(Path::new("index.js")));
    }

    #[test]
    fn classify_entry_types() {
        assert_eq!(classify(EntryType::Regular), Disposition::Write);
        assert_eq!(classify(EntryType::Directory), Disposition::Write);
        assert_eq!(classify(EntryType::Symlink), Disposition::SkipLink);
        assert_eq!(classify(EntryType::Link), Disposition::SkipLink);
        assert_eq!(classify(EntryType::Fifo), Disposition::SkipOther);
        assert_eq!(classify(EntryType::Char), Disposition::SkipOther);
    }

    #[test]
    fn decompress_passes_plain_input_through() {
        let mut out = String::new();
        decompress(&b"plain text"[..])
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "plain text");
    }

    #[test]
    fn decompress_decodes_gzip() {
        let compressed = gzip(b"hello gzip");
        let mut out = String::new();
        decompress(&compressed[..])
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "hello gzip");
    }

    #[test]
    fn decompress_handles_short_input() {
        let mut out = Vec::new();
        decompress(&[0x1f][..]).unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![0x1f]);
    }

    #[test]
    fn extract_strips_package_prefix() {
        let temp = TempDir::new().unwrap();
        let archive = gzip(&tarball(&[
            Item::Dir("package/", 0o755),
            Item::File("package/index.js", b"module.exports = 1;", 0o644),
            Item::File("package/lib/util.js", b"exports.x = 2;", 0o644),
        ]));

        let summary = extract(&archive[..], temp.path()).unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(
            fs::read_to_string(temp.path().join("index.js")).unwrap(),
            "module.exports = 1;"
        );
        assert!(temp.path().join("lib/util.js").is_file());
        assert!(!temp.path().join("package").exists());
    }

    #[test]
    fn extract_uncompressed_tar() {
        let temp = TempDir::new().unwrap();
        let archive = tarball(&[Item::File("package/a.txt", b"a", 0o644)]);

        extract(&archive[..], temp.path()).unwrap();

        assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "a");
    }

    #[test]
    fn extract_drops_symlinks() {
        let temp = TempDir::new().unwrap();
        let archive = gzip(&tarball(&[
            Item::File("package/index.js", b"x", 0o644),
            Item::Symlink("package/evil", "../../../../etc/passwd"),
            Item::HardLink("package/hard", "../../../../etc/shadow"),
        ]));

        let summary = extract(&archive[..], temp.path()).unwrap();

        assert_eq!(summary.skipped_links, 2);
        assert!(temp.path().join("evil").symlink_metadata().is_err());
        assert!(temp.path().join("hard").symlink_metadata().is_err());
        assert!(temp.path().join("index.js").is_file());
    }

    #[test]
    fn extract_skips_escaping_paths() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("out");
        fs::create_dir(&output).unwrap();
        let archive = gzip(&tarball(&[
            Item::RawName(b"package/../escape.txt", b"gotcha"),
            Item::File("package/ok.txt", b"ok", 0o644),
        ]));

        let summary = extract(&archive[..], &output).unwrap();

        assert_eq!(summary.skipped_unsafe, 1);
        assert!(!temp.path().join("escape.txt").exists());
        assert!(output.join("ok.txt").is_file());
    }

    #[test]
    fn extract_ignores_dot_entries() {
        let temp = TempDir::new().unwrap();
        let archive = gzip(&tarball(&[
            Item::RawName(b"package/./", b""),
            Item::File("package/index.js", b"x", 0o644),
        ]));

        let summary = extract(&archive[..], temp.path()).unwrap();

        assert_eq!(summary.skipped_unsafe, 0);
        assert_eq!(summary.files, 1);
    }

    #[test]
    fn extract_never_writes_completion_marker() {
        let temp = TempDir::new().unwrap();
        let archive = gzip(&tarball(&[
            Item::File("package/.pkgcache-complete", b"{}", 0o644),
            Item::Dir("package/.pkgcache-complete/", 0o755),
            Item::File("package/lib/.pkgcache-complete", b"{}", 0o644),
            Item::File("package/index.js", b"x", 0o644),
        ]));

        let summary = extract(&archive[..], temp.path()).unwrap();

        assert_eq!(summary.skipped_unsafe, 2);
        assert!(!temp.path().join(COMPLETION_MARKER).exists());
        assert!(temp.path().join("lib").join(COMPLETION_MARKER).is_file());
        assert!(temp.path().join("index.js").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn extract_makes_entries_readable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let archive = gzip(&tarball(&[
            Item::Dir("package/bin/", 0o700),
            Item::File("package/bin/cli", b"#!/bin/sh", 0o755),
            Item::File("package/secret", b"s", 0o200),
        ]));

        extract(&archive[..], temp.path()).unwrap();

        let mode = |p: &str| {
            fs::metadata(temp.path().join(p))
                .unwrap()
                .permissions()
                .mode()
                & 0o777
        };
        assert_eq!(mode("secret"), 0o644);
        assert_eq!(mode("bin/cli"), 0o755);
        assert_eq!(mode("bin"), 0o755);
    }

    #[test]
    fn extract_rejects_corrupt_gzip() {
        let temp = TempDir::new().unwrap();
        let mut garbage = GZIP_MAGIC.to_vec();
        garbage.extend_from_slice(b"definitely not deflate data");

        let result = extract(&garbage[..], temp.path());

        assert!(matches!(result, Err(PkgcacheError::Archive { .. })));
    }

    #[test]
    fn extract_rejects_truncated_stream() {
        let temp = TempDir::new().unwrap();
        let content = vec![b'x'; 64 * 1024];
        let archive = gzip(&tarball(&[Item::File("package/big.bin", &content, 0o644)]));
        let truncated = &archive[..archive.len() / 2];

        let result = extract(truncated, temp.path());

        assert!(matches!(result, Err(PkgcacheError::Archive { .. })));
    }
}
