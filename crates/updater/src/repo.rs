//! Persisted per-repository client configuration.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Config;
use crate::error::Result;

/// Default repository-relative location of the Ed25519 public key.
pub const DEFAULT_PUBKEY_PATH: &str = "repo/public-keys/ed25519.pub";

/// Connection and trust parameters for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoConfig {
    pub repo_id: String,
    pub base_url: String,
    /// Repository-relative path of the public key object.
    pub pubkey_path: String,
    /// Pinned lowercase-hex SHA-256 of the raw public key bytes.
    pub pubkey_sha256: String,
}

/// Location of the repo config file under the config root.
pub fn config_path(config_dir: &Path, repo_id: &str) -> PathBuf {
    config_dir.join("repos").join(format!("{repo_id}.env"))
}

/// Load the persisted config for `repo_id`; missing file yields defaults.
pub fn load(config_dir: &Path, repo_id: &str) -> Result<RepoConfig> {
    let path = config_path(config_dir, repo_id);
    debug!(path = %path.display(), "loading repo config");
    let cfg = Config::load_file(&path)?;

    Ok(RepoConfig {
        repo_id: cfg.get("ITRUST_REPO_ID", repo_id),
        base_url: cfg.get("ITRUST_BASE_URL", ""),
        pubkey_path: cfg.get("ITRUST_REPO_PUBKEY_PATH", DEFAULT_PUBKEY_PATH),
        pubkey_sha256: cfg.get("ITRUST_REPO_PUBKEY_SHA256", ""),
    })
}

/// Write the repo config file (0600; parent directories 0755).
pub fn save(config_dir: &Path, rc: &RepoConfig) -> Result<()> {
    let path = config_path(config_dir, &rc.repo_id);
    std::fs::create_dir_all(path.parent().expect("repo config path has a parent"))?;

    let content = to_env_snippet(rc);
    std::fs::write(&path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

/// Render the config as the `KEY=VALUE` snippet used by export/import.
pub fn to_env_snippet(rc: &RepoConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ITRUST_REPO_ID={}", rc.repo_id);
    let _ = writeln!(out, "ITRUST_BASE_URL={}", rc.base_url);
    let _ = writeln!(out, "ITRUST_REPO_PUBKEY_PATH={}", rc.pubkey_path);
    let _ = writeln!(out, "ITRUST_REPO_PUBKEY_SHA256={}", rc.pubkey_sha256);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let rc = RepoConfig {
            repo_id: "test-repo".into(),
            base_url: "https://nexus.example.com".into(),
            pubkey_path: "keys/ed25519.pub".into(),
            pubkey_sha256: "abcdef1234567890".into(),
        };

        save(tmp.path(), &rc).expect("save succeeds");
        assert!(config_path(tmp.path(), "test-repo").exists());

        let loaded = load(tmp.path(), "test-repo").expect("load succeeds");
        assert_eq!(loaded, rc);
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded = load(tmp.path(), "ghost").unwrap();

        assert_eq!(loaded.repo_id, "ghost");
        assert_eq!(loaded.base_url, "");
        assert_eq!(loaded.pubkey_path, DEFAULT_PUBKEY_PATH);
    }

    #[cfg(unix)]
    #[test]
    fn config_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let rc = RepoConfig {
            repo_id: "r".into(),
            base_url: "https://x".into(),
            pubkey_path: DEFAULT_PUBKEY_PATH.into(),
            pubkey_sha256: "ff".into(),
        };
        save(tmp.path(), &rc).unwrap();

        let mode = std::fs::metadata(config_path(tmp.path(), "r"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn snippet_lists_all_keys() {
        let rc = RepoConfig {
            repo_id: "r1".into(),
            base_url: "https://x".into(),
            pubkey_path: DEFAULT_PUBKEY_PATH.into(),
            pubkey_sha256: "aa".into(),
        };
        let snippet = to_env_snippet(&rc);
        assert_eq!(
            snippet,
            "ITRUST_REPO_ID=r1\nITRUST_BASE_URL=https://x\nITRUST_REPO_PUBKEY_PATH=repo/public-keys/ed25519.pub\nITRUST_REPO_PUBKEY_SHA256=aa\n"
        );
    }
}
