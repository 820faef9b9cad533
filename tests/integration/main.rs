//! Integration tests for pkgcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use flate2::{write::GzEncoder, Compression};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// A command isolated from the user's config and cache
    fn pkgcache(home: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("pkgcache");
        cmd.env("PKGCACHE_CONFIG", home.path().join("config.toml"))
            .env("NPM_PACKAGE_CACHE_DIR", home.path().join("cache"))
            .env_remove("RUST_LOG");
        cmd
    }

    fn write_tarball(dir: &Path) -> PathBuf {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, body) in [
            ("package/package.json", &br#"{"name":"left-pad","version":"1.3.0"}"#[..]),
            ("package/index.js", &b"module.exports = leftPad;\n"[..]),
        ] {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
            builder.append_data(&mut header, path, body).unwrap();
        }
        let bytes = builder.into_inner().unwrap().finish().unwrap();

        let tarball = dir.join("left-pad-1.3.0.tgz");
        std::fs::write(&tarball, bytes).unwrap();
        tarball
    }

    fn file_url(path: &Path) -> String {
        format!("file://{}", path.display())
    }

    #[test]
    fn help_displays() {
        let home = TempDir::new().unwrap();
        pkgcache(&home)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("package tarball cache"));
    }

    #[test]
    fn version_displays() {
        let home = TempDir::new().unwrap();
        pkgcache(&home)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("pkgcache"));
    }

    #[test]
    fn config_path() {
        let home = TempDir::new().unwrap();
        pkgcache(&home)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let home = TempDir::new().unwrap();
        pkgcache(&home)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("prefix = \"pkgcache\""));
    }

    #[test]
    fn config_set_then_show() {
        let home = TempDir::new().unwrap();
        pkgcache(&home)
            .args(["config", "set", "cache.prefix", "unpkg"])
            .assert()
            .success();

        pkgcache(&home)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("prefix = \"unpkg\""));
    }

    #[test]
    fn config_set_unknown_key() {
        let home = TempDir::new().unwrap();
        pkgcache(&home)
            .args(["config", "set", "cache.size", "10"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn path_reports_miss() {
        let home = TempDir::new().unwrap();
        pkgcache(&home)
            .args(["path", "@babel/core", "7.24.0"])
            .assert()
            .success()
            .stdout(predicate::str::contains("pkgcache-@babel+core@7.24.0"))
            .stdout(predicate::str::contains("miss"));
    }

    #[test]
    fn list_empty() {
        let home = TempDir::new().unwrap();
        pkgcache(&home)
            .args(["list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached packages"));
    }

    #[test]
    fn fetch_file_url_populates_cache() {
        let home = TempDir::new().unwrap();
        let tarball = write_tarball(home.path());

        pkgcache(&home)
            .args(["fetch", "left-pad", "1.3.0", &file_url(&tarball), "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"origin\": \"fetched\""));

        let dir = home.path().join("cache").join("pkgcache-left-pad@1.3.0");
        assert!(dir.join("index.js").is_file());
        assert!(dir.join("package.json").is_file());
        assert!(!dir.join("package").exists());

        pkgcache(&home)
            .args(["fetch", "left-pad", "1.3.0", &file_url(&tarball), "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"origin\": \"cache_hit\""));

        pkgcache(&home)
            .args(["list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("pkgcache-left-pad@1.3.0"));
    }

    #[test]
    fn cache_dir_flag_overrides_env() {
        let home = TempDir::new().unwrap();
        let tarball = write_tarball(home.path());
        let elsewhere = home.path().join("elsewhere");

        pkgcache(&home)
            .arg("--cache-dir")
            .arg(&elsewhere)
            .args(["fetch", "left-pad", "1.3.0", &file_url(&tarball)])
            .assert()
            .success();

        assert!(elsewhere.join("pkgcache-left-pad@1.3.0/index.js").is_file());
        assert!(!home.path().join("cache").exists());
    }

    #[test]
    fn fetch_rejects_invalid_name() {
        let home = TempDir::new().unwrap();
        pkgcache(&home)
            .args(["fetch", "bad+name", "1.0.0", "file:///nowhere.tgz"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn fetch_rejects_unsupported_url() {
        let home = TempDir::new().unwrap();
        pkgcache(&home)
            .args(["fetch", "left-pad", "1.3.0", "ftp://example.com/left-pad.tgz"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("ftp://example.com/left-pad.tgz"));
    }
}
