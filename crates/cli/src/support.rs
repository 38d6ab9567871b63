//! Shared plumbing for the command handlers: merged configuration, secret
//! resolution, and backend construction.

use anyhow::{bail, Result};
use std::path::Path;
use tracing::debug;
use updater::config::{merge_configs, Config};
use updater::nexus::NexusBackend;
use updater::secrets::{self, KeyringSecretStore, SecretStore};
use zeroize::Zeroizing;

use crate::prompt;
use crate::Globals;

/// Host operating system in repository naming (`linux`, `darwin`,
/// `windows`).
pub fn host_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Host architecture in repository naming (`amd64`, `arm64`).
pub fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

/// Merge configuration layers for a profile: process environment over the
/// profile file over the shared `repo.env`.
pub fn load_merged_config(config_dir: &Path, profile: &str) -> Result<Config> {
    let env_cfg = Config::from_env();
    let profile_cfg = Config::load_file(&updater::paths::profile_config_path(config_dir, profile))?;
    let repo_cfg = Config::load_file(&config_dir.join("repo.env"))?;
    Ok(merge_configs([env_cfg, profile_cfg, repo_cfg]))
}

/// Overlay the persisted repo config for `ITRUST_REPO_ID`, filling only the
/// keys the merged config left unset.
pub fn apply_repo_overlay(cfg: &mut Config, config_dir: &Path) {
    let repo_id = cfg.get("ITRUST_REPO_ID", "");
    if repo_id.is_empty() {
        return;
    }
    debug!(repo_id = %repo_id, "loading repo config overlay");
    match updater::repo::load(config_dir, &repo_id) {
        Ok(rc) => {
            cfg.set_default("ITRUST_BASE_URL", &rc.base_url);
            cfg.set_default("ITRUST_REPO_PUBKEY_SHA256", &rc.pubkey_sha256);
            cfg.set_default("ITRUST_REPO_PUBKEY_PATH", &rc.pubkey_path);
        }
        // Missing or unreadable repo config just skips the overlay.
        Err(err) => debug!(repo_id = %repo_id, error = %err, "repo config overlay skipped"),
    }
}

pub struct Credentials {
    pub username: String,
    pub password: Zeroizing<String>,
}

/// Resolve Nexus credentials: environment, keyring by repository, legacy
/// keyring by username, then an interactive prompt.
///
/// Anonymous access (no username, no password) is allowed; a username
/// without any password source is an error in non-interactive mode.
pub fn resolve_credentials(
    cfg: &Config,
    repo_id: &str,
    globals: &Globals,
) -> Result<Credentials> {
    let mut username = cfg.get("ITRUST_NEXUS_USERNAME", "");
    let mut password = Zeroizing::new(std::env::var("ITRUST_NEXUS_PASSWORD").unwrap_or_default());

    if password.is_empty() && globals.use_keyring && !repo_id.is_empty() {
        debug!("attempting to get credentials from keyring");
        let store = KeyringSecretStore;
        if username.is_empty() {
            username = store
                .get(secrets::SERVICE, &secrets::username_key(repo_id))
                .unwrap_or_default();
        }
        if let Ok(stored) = store.get(secrets::SERVICE, &secrets::password_key(repo_id)) {
            password = Zeroizing::new(stored);
        }
    }

    // Single-repo keyring layout kept for installations predating repo ids.
    if password.is_empty() && globals.use_keyring && !username.is_empty() {
        debug!("attempting to get credentials from keyring (fallback)");
        if let Ok(stored) = KeyringSecretStore.get(secrets::SERVICE, &username) {
            password = Zeroizing::new(stored);
        }
    }

    if password.is_empty() && !globals.non_interactive {
        if username.is_empty() {
            username = prompt::read_line("Enter Nexus username: ")?;
        }
        if !username.is_empty() {
            password = prompt::read_password(&format!("Enter Nexus password for {username}: "))?;
        }
    }

    if password.is_empty() && !username.is_empty() && globals.non_interactive {
        bail!(
            "Nexus password is required but not provided (use ITRUST_NEXUS_PASSWORD or init --store-credentials)"
        );
    }
    if password.is_empty() && username.is_empty() {
        debug!("no Nexus credentials provided, proceeding without auth");
    }

    Ok(Credentials { username, password })
}

/// Resolve the publisher signing seed: merged config/environment, keyring
/// by repository, then the legacy signing keyring.
pub fn resolve_seed(cfg: &Config, repo_id: &str, use_keyring: bool) -> Result<Zeroizing<String>> {
    let mut seed = Zeroizing::new(cfg.get("ITRUST_REPO_SIGNING_ED25519_SEED_B64", ""));

    if seed.is_empty() && use_keyring && !repo_id.is_empty() {
        debug!("attempting to get signing seed from keyring");
        if let Ok(stored) = KeyringSecretStore.get(secrets::SERVICE, &secrets::seed_key(repo_id)) {
            seed = Zeroizing::new(stored);
        }
    }
    if seed.is_empty() && use_keyring {
        if let Ok(stored) = KeyringSecretStore.get(secrets::LEGACY_SIGNING_SERVICE, repo_id) {
            seed = Zeroizing::new(stored);
        }
    }
    if seed.is_empty() {
        bail!("repository signing seed missing (ITRUST_REPO_SIGNING_ED25519_SEED_B64)");
    }
    Ok(seed)
}

/// Construct the backend named by `ITRUST_BACKEND`.
pub fn make_backend(backend_type: &str, base_url: &str, creds: &Credentials) -> Result<NexusBackend> {
    match backend_type {
        "nexus" => Ok(NexusBackend::new(base_url, &creds.username, &creds.password)),
        other => bail!("unsupported backend: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_identifiers_are_repository_style() {
        assert!(!host_os().is_empty());
        assert!(!host_arch().is_empty());
        assert_ne!(host_os(), "macos");
        assert_ne!(host_arch(), "x86_64");
    }

    #[test]
    fn merged_config_prefers_profile_over_repo_env() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("apps")).unwrap();
        std::fs::write(
            tmp.path().join("apps/p.env"),
            "ITRUST_CHANNEL=beta\nITRUST_APP_ID=app1\n",
        )
        .unwrap();
        std::fs::write(tmp.path().join("repo.env"), "ITRUST_CHANNEL=stable\nITRUST_BASE_URL=https://x\n")
            .unwrap();

        let cfg = load_merged_config(tmp.path(), "p").unwrap();
        assert_eq!(cfg.get("ITRUST_CHANNEL", ""), "beta");
        assert_eq!(cfg.get("ITRUST_APP_ID", ""), "app1");
        assert_eq!(cfg.get("ITRUST_BASE_URL", ""), "https://x");
    }

    #[test]
    fn repo_overlay_fills_only_missing_keys() {
        let tmp = tempfile::tempdir().unwrap();
        updater::repo::save(
            tmp.path(),
            &updater::repo::RepoConfig {
                repo_id: "r1".into(),
                base_url: "https://overlay".into(),
                pubkey_path: "keys/k.pub".into(),
                pubkey_sha256: "ff".into(),
            },
        )
        .unwrap();

        let mut cfg = Config::new();
        cfg.set("ITRUST_REPO_ID", "r1");
        cfg.set("ITRUST_BASE_URL", "https://explicit");
        apply_repo_overlay(&mut cfg, tmp.path());

        assert_eq!(cfg.get("ITRUST_BASE_URL", ""), "https://explicit");
        assert_eq!(cfg.get("ITRUST_REPO_PUBKEY_SHA256", ""), "ff");
        assert_eq!(cfg.get("ITRUST_REPO_PUBKEY_PATH", ""), "keys/k.pub");
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let creds = Credentials {
            username: String::new(),
            password: Zeroizing::new(String::new()),
        };
        assert!(make_backend("s3", "https://x", &creds).is_err());
        assert!(make_backend("nexus", "https://x", &creds).is_ok());
    }
}
