//! Streaming artifact installation and per-profile install state.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::backend::ByteStream;
use crate::error::{Result, UpdaterError};
use crate::sign::Hasher;

/// What is currently installed for one profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub profile: String,
    pub app_id: String,
    pub channel: String,
    pub installed_version: String,
    pub installed_sha256: String,
    pub installed_at: DateTime<Utc>,
    pub dest: PathBuf,
    pub os: String,
    pub arch: String,
    #[serde(rename = "sourceURL")]
    pub source_url: String,
    pub backend_info: String,
}

fn state_path(state_dir: &Path, profile: &str) -> PathBuf {
    state_dir.join("state").join(format!("{profile}.json"))
}

/// Load the install state for `profile`. A missing state file is not an
/// error; it simply means nothing was installed yet.
pub fn load_state(state_dir: &Path, profile: &str) -> Result<Option<State>> {
    let path = state_path(state_dir, profile);
    let data = match std::fs::read(&path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(Some(serde_json::from_slice(&data)?))
}

/// Persist the install state via a sibling temp file and atomic rename.
///
/// Concurrent invocations on the same profile race and the last rename
/// wins.
pub fn save_state(state_dir: &Path, profile: &str, state: &State) -> Result<()> {
    let path = state_path(state_dir, profile);
    let dir = path.parent().expect("state path has a parent");
    std::fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, state)?;
    temp.flush()?;
    temp.persist(&path).map_err(|err| UpdaterError::Io(err.error))?;
    Ok(())
}

/// Stream `src` into `dest` with an inline SHA-256 check and atomic swap.
///
/// The destination and the state store are never touched before the digest
/// matched `expected_sha256`. An existing destination is first copied to
/// `<state_dir>/backups/<profile>/<timestamp>/`. Returns the verified
/// digest.
pub async fn install_artifact(
    mut src: ByteStream,
    dest: &Path,
    expected_sha256: &str,
    state_dir: &Path,
    profile: &str,
) -> Result<String> {
    let dest_dir = dest
        .parent()
        .ok_or_else(|| UpdaterError::validation("destination path must have a parent directory"))?;
    std::fs::create_dir_all(dest_dir)?;

    // Same directory as dest so the final rename stays on one filesystem.
    let mut temp = NamedTempFile::new_in(dest_dir)?;
    let mut hasher = Hasher::new();

    while let Some(chunk) = src.next().await {
        let chunk = chunk?;
        hasher.update(&chunk);
        temp.write_all(&chunk)?;
    }

    let actual = hasher.finalize();
    if actual != expected_sha256 {
        // Dropping the NamedTempFile removes it from the dest directory.
        return Err(UpdaterError::IntegrityMismatch {
            expected: expected_sha256.to_string(),
            actual,
        });
    }

    temp.flush()?;
    temp.as_file().sync_all()?;

    if dest.exists() {
        backup_existing(dest, state_dir, profile)?;
    }

    temp.persist(dest).map_err(|err| UpdaterError::Io(err.error))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dest, std::fs::Permissions::from_mode(0o755))?;
    }

    info!(dest = %dest.display(), sha256 = %actual, "artifact installed");
    Ok(actual)
}

fn backup_existing(dest: &Path, state_dir: &Path, profile: &str) -> Result<()> {
    let stamp = Utc::now().format("%Y%m%d-%H%M%S").to_string();
    let backup_dir = state_dir.join("backups").join(profile).join(stamp);
    let backup_path = backup_dir.join(dest.file_name().unwrap_or_default());

    let result = (|| -> std::io::Result<()> {
        std::fs::create_dir_all(&backup_dir)?;
        copy_contents(dest, &backup_path)
    })();
    result.map_err(|source| UpdaterError::BackupFailed { path: dest.to_path_buf(), source })?;

    debug!(from = %dest.display(), to = %backup_path.display(), "previous binary backed up");
    Ok(())
}

// Content-only copy; backups do not preserve metadata.
fn copy_contents(src: &Path, dst: &Path) -> std::io::Result<()> {
    let mut input = std::fs::File::open(src)?;
    let mut output = std::fs::File::create(dst)?;
    std::io::copy(&mut input, &mut output)?;
    Ok(())
}
