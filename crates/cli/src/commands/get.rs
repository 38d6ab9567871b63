use anyhow::{bail, Context, Result};
use chrono::{SubsecRound, Utc};
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use updater::backend::Backend;
use updater::install::{self, State};
use updater::{fetch, paths};

use crate::support;
use crate::Globals;

#[derive(Args)]
pub struct GetArgs {
    /// Profile name
    pub profile: String,

    /// Specific version to install (defaults to the channel's latest)
    #[arg(long)]
    pub version: Option<String>,

    /// Override destination path
    #[arg(long)]
    pub dest: Option<String>,

    /// Override operating system
    #[arg(long, default_value_t = support::host_os().to_string())]
    pub os: String,

    /// Override architecture
    #[arg(long, default_value_t = support::host_arch().to_string())]
    pub arch: String,

    /// Override configuration directory
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Override state directory
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Force download and installation
    #[arg(long)]
    pub force: bool,
}

/// Append the artifact's filename when the destination is a directory.
fn resolve_dest(dest: &str, app_id: &str, artifact_url: &str, os: &str, kind: &str) -> PathBuf {
    let dest = PathBuf::from(dest);
    if !dest.is_dir() {
        return dest;
    }
    let ext = Path::new(artifact_url)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let ext = if ext.is_empty() && os == "windows" && kind == "binary" {
        ".exe".to_string()
    } else {
        ext
    };
    dest.join(format!("{app_id}{ext}"))
}

pub async fn run(args: GetArgs, globals: &Globals) -> Result<()> {
    let (config_dir, state_dir) = paths::resolve(args.config_dir.clone(), args.state_dir.clone());
    let version = args.version.clone().unwrap_or_default();
    info!(profile = %args.profile, version = %version, "starting get");
    debug!(config_dir = %config_dir.display(), state_dir = %state_dir.display(), "resolved directories");

    let mut cfg = support::load_merged_config(&config_dir, &args.profile)?;
    support::apply_repo_overlay(&mut cfg, &config_dir);

    let base_url = cfg.get("ITRUST_BASE_URL", "");
    let app_id = cfg.get("ITRUST_APP_ID", "");
    let channel = cfg.get("ITRUST_CHANNEL", "stable");
    let expected_pubkey_sha = cfg.get("ITRUST_REPO_PUBKEY_SHA256", "");
    let backend_type = cfg.get("ITRUST_BACKEND", "nexus");
    let pubkey_path = cfg.get("ITRUST_REPO_PUBKEY_PATH", updater::repo::DEFAULT_PUBKEY_PATH);
    let repo_id = cfg.get("ITRUST_REPO_ID", "");

    let dest = args.dest.clone().unwrap_or_else(|| cfg.get("ITRUST_DEST", ""));
    if base_url.is_empty() || app_id.is_empty() || expected_pubkey_sha.is_empty() || dest.is_empty()
    {
        bail!("missing required configuration (ITRUST_BASE_URL, ITRUST_APP_ID, ITRUST_REPO_PUBKEY_SHA256, ITRUST_DEST)");
    }

    let creds = support::resolve_credentials(&cfg, &repo_id, globals)?;
    let backend = support::make_backend(&backend_type, &base_url, &creds)?;

    info!(app_id = %app_id, channel = %channel, version = %version, "fetching manifest");
    let (manifest, _) = fetch::fetch_and_verify_manifest(
        &backend,
        &app_id,
        &channel,
        &version,
        &pubkey_path,
        &expected_pubkey_sha,
    )
    .await
    .context("failed to fetch/verify manifest")?;

    let artifact = manifest
        .find_artifact(&args.os, &args.arch)
        .context("artifact not found")?
        .clone();
    debug!(url = %artifact.url, "found artifact");

    let dest = resolve_dest(&dest, &app_id, &artifact.url, &args.os, &artifact.kind);
    debug!(dest = %dest.display(), "resolved destination path");

    let latest_version = manifest.payload.latest.version.clone();
    if !args.force {
        if let Some(state) = install::load_state(&state_dir, &args.profile)? {
            if state.installed_version == latest_version
                && state.installed_sha256 == artifact.sha256
                && dest.exists()
            {
                println!("Application {app_id} is up to date (version {})", state.installed_version);
                info!(app_id = %app_id, version = %state.installed_version, "up to date");
                return Ok(());
            }
        }
    }

    println!("Downloading {app_id} version {latest_version}...");
    info!(app_id = %app_id, version = %latest_version, url = %artifact.url, "downloading artifact");
    let body = backend
        .get(&artifact.url)
        .await
        .context("failed to download artifact")?;

    info!(dest = %dest.display(), "installing artifact");
    let actual_sha =
        install::install_artifact(body, &dest, &artifact.sha256, &state_dir, &args.profile)
            .await
            .context("installation failed")?;

    let state = State {
        profile: args.profile.clone(),
        app_id: app_id.clone(),
        channel,
        installed_version: latest_version.clone(),
        installed_sha256: actual_sha,
        installed_at: Utc::now().trunc_subsecs(0),
        dest: dest.clone(),
        os: args.os.clone(),
        arch: args.arch.clone(),
        source_url: artifact.url.clone(),
        backend_info: backend_type,
    };
    if let Err(err) = install::save_state(&state_dir, &args.profile, &state) {
        error!(error = %err, "failed to save state");
    }

    println!("Successfully installed {app_id} version {latest_version} to {}", dest.display());
    info!(app_id = %app_id, version = %latest_version, dest = %dest.display(), "install complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_file_dest_is_untouched() {
        let dest = resolve_dest("/opt/tools/tpm-tool", "tpm-tool", "apps/x/tool", "linux", "binary");
        assert_eq!(dest, PathBuf::from("/opt/tools/tpm-tool"));
    }

    #[test]
    fn directory_dest_gains_artifact_filename() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_string_lossy().into_owned();

        let dest = resolve_dest(&dir, "tool", "apps/x/tool_1.0.0_any_any.jar", "any", "jar");
        assert_eq!(dest, tmp.path().join("tool.jar"));

        let dest = resolve_dest(&dir, "tool", "apps/x/tool_1.0.0_linux_amd64", "linux", "binary");
        assert_eq!(dest, tmp.path().join("tool"));
    }

    #[test]
    fn windows_binary_defaults_to_exe() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_string_lossy().into_owned();

        let dest = resolve_dest(&dir, "tool", "apps/x/tool_1.0.0_windows_amd64", "windows", "binary");
        assert_eq!(dest, tmp.path().join("tool.exe"));
    }
}
