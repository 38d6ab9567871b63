//! Publisher-side release assembly: artifact classification, merge into an
//! existing release, signing, and the ordered upload pipeline.

use chrono::{SubsecRound, Utc};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::backend::{read_all, Backend, OpenBody};
use crate::error::{Result, UpdaterError};
use crate::manifest::{
    sign_manifest, version_manifest_path, channel_manifest_path, AppInfo, Artifact, Manifest,
    Payload, Release, RepoInfo,
};
use crate::sign;

/// Everything `push_release` needs besides the secrets.
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub repo_id: String,
    pub repo_name: String,
    pub app_id: String,
    pub app_name: String,
    pub channel: String,
    pub version: String,
    pub os: String,
    pub arch: String,
    pub artifact_path: std::path::PathBuf,
    /// Replace an existing (os, arch) entry instead of failing.
    pub force: bool,
}

/// Lowercased extension of the artifact file, leading dot included; empty
/// when the file has none. The extension is preserved verbatim in the
/// uploaded object name.
pub fn artifact_ext(path: &Path) -> String {
    match path.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy().to_lowercase()),
        None => String::new(),
    }
}

/// Artifact type derived from the file extension. Jars are platform
/// independent; callers must force (os, arch) to ("any", "any") for them.
pub fn infer_kind(ext: &str) -> &'static str {
    match ext {
        ".jar" => "jar",
        ".zip" => "zip",
        ".msi" => "msi",
        ".exe" => "exe",
        _ => "binary",
    }
}

/// Repository path of the uploaded artifact object.
pub fn remote_artifact_path(app_id: &str, version: &str, os: &str, arch: &str, ext: &str) -> String {
    format!("apps/{app_id}/releases/v{version}/{os}/{arch}/{app_id}_{version}_{os}_{arch}{ext}")
}

/// Merge `new` into the artifact list of an existing release.
///
/// A matching (os, arch) entry is a conflict unless `force` is set, in
/// which case the entry is replaced in place; all other entries are
/// preserved untouched.
pub fn merge_artifacts(
    existing: &[Artifact],
    new: Artifact,
    force: bool,
    version: &str,
) -> Result<Vec<Artifact>> {
    let collision = existing.iter().any(|a| a.os == new.os && a.arch == new.arch);
    if collision && !force {
        return Err(UpdaterError::ReleaseConflict {
            os: new.os,
            arch: new.arch,
            version: version.to_string(),
        });
    }

    let mut merged = Vec::with_capacity(existing.len() + 1);
    let mut placed = false;
    for artifact in existing {
        if artifact.os == new.os && artifact.arch == new.arch {
            merged.push(new.clone());
            placed = true;
        } else {
            merged.push(artifact.clone());
        }
    }
    if !placed {
        merged.push(new);
    }
    Ok(merged)
}

/// Upload one artifact and publish the signed manifests for its release.
///
/// Upload order is fixed: artifact blob, its `.sha256` sidecar, the version
/// manifest, the channel manifest. Readers that see a manifest therefore
/// always find the blob it points to. The sidecar upload is best-effort.
pub async fn push_release(
    backend: &dyn Backend,
    req: &PushRequest,
    seed_b64: &str,
) -> Result<Manifest> {
    let sha256 = sign::file_sha256(&req.artifact_path)?;
    let size = std::fs::metadata(&req.artifact_path)?.len();

    let ext = artifact_ext(&req.artifact_path);
    let kind = infer_kind(&ext);
    let (os, arch) = if kind == "jar" {
        ("any".to_string(), "any".to_string())
    } else {
        (req.os.clone(), req.arch.clone())
    };

    let remote_path = remote_artifact_path(&req.app_id, &req.version, &os, &arch, &ext);
    debug!(path = %remote_path, sha256 = %sha256, size, "artifact metadata computed");

    // The existing version manifest is only a hint for merging; we are about
    // to replace it with one we sign ourselves, so its signature is not
    // checked here.
    let manifest_path = version_manifest_path(&req.app_id, &req.version);
    let existing = if backend.exists(&manifest_path).await? {
        debug!(path = %manifest_path, "version manifest exists, reconciling");
        let raw = read_all(backend.get(&manifest_path).await?).await?;
        let hint: Manifest = serde_json::from_slice(&raw)?;
        hint.payload.latest.artifacts
    } else {
        Vec::new()
    };

    let new_artifact = Artifact {
        os: os.clone(),
        arch: arch.clone(),
        kind: kind.to_string(),
        url: remote_path.clone(),
        size,
        sha256: sha256.clone(),
    };
    let artifacts = merge_artifacts(&existing, new_artifact, req.force, &req.version)?;

    info!(path = %remote_path, "uploading artifact");
    backend
        .put(&remote_path, &OpenBody::from_file(&req.artifact_path), "application/octet-stream")
        .await?;

    let sha_sidecar = format!("{remote_path}.sha256");
    if let Err(err) = backend
        .put(&sha_sidecar, &OpenBody::from_bytes(sha256.into_bytes()), "text/plain")
        .await
    {
        warn!(path = %sha_sidecar, error = %err, "failed to upload sha256 sidecar");
    }

    let now = Utc::now().trunc_subsecs(0);
    let payload = Payload {
        schema_version: 1,
        repo: RepoInfo { id: req.repo_id.clone(), name: req.repo_name.clone() },
        app: AppInfo { id: req.app_id.clone(), name: req.app_name.clone() },
        channel: req.channel.clone(),
        generated_at: now,
        latest: Release {
            version: req.version.clone(),
            release_date: now,
            notes: String::new(),
            artifacts,
        },
    };

    let key_id = format!("repo-key-{}", now.format("%Y-%m"));
    let manifest = sign_manifest(payload, seed_b64, &key_id)?;
    let encoded = serde_json::to_vec_pretty(&manifest)?;

    info!(path = %manifest_path, "uploading version manifest");
    backend
        .put(&manifest_path, &OpenBody::from_bytes(encoded.clone()), "application/json")
        .await?;

    let channel_path = channel_manifest_path(&req.app_id, &req.channel);
    info!(path = %channel_path, "updating channel manifest");
    backend
        .put(&channel_path, &OpenBody::from_bytes(encoded), "application/json")
        .await?;

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use base64::{engine::general_purpose, Engine as _};

    fn artifact(os: &str, arch: &str, sha: &str) -> Artifact {
        Artifact {
            os: os.into(),
            arch: arch.into(),
            kind: "binary".into(),
            url: format!("apps/a/releases/v1.0.0/{os}/{arch}/a_1.0.0_{os}_{arch}"),
            size: 10,
            sha256: sha.into(),
        }
    }

    #[test]
    fn kind_from_extension() {
        assert_eq!(infer_kind(".jar"), "jar");
        assert_eq!(infer_kind(".zip"), "zip");
        assert_eq!(infer_kind(".msi"), "msi");
        assert_eq!(infer_kind(".exe"), "exe");
        assert_eq!(infer_kind(".bin"), "binary");
        assert_eq!(infer_kind(""), "binary");
    }

    #[test]
    fn extension_is_lowercased_and_preserved() {
        assert_eq!(artifact_ext(Path::new("/tmp/app.JAR")), ".jar");
        assert_eq!(artifact_ext(Path::new("/tmp/app.tar")), ".tar");
        assert_eq!(artifact_ext(Path::new("/tmp/app")), "");
    }

    #[test]
    fn remote_path_layout() {
        assert_eq!(
            remote_artifact_path("app1", "1.2.3", "linux", "amd64", ""),
            "apps/app1/releases/v1.2.3/linux/amd64/app1_1.2.3_linux_amd64"
        );
        assert_eq!(
            remote_artifact_path("app1", "1.2.3", "any", "any", ".jar"),
            "apps/app1/releases/v1.2.3/any/any/app1_1.2.3_any_any.jar"
        );
    }

    #[test]
    fn merge_conflict_without_force() {
        let existing = vec![artifact("linux", "amd64", "aa")];
        let err = merge_artifacts(&existing, artifact("linux", "amd64", "bb"), false, "1.0.0")
            .unwrap_err();
        assert!(matches!(err, UpdaterError::ReleaseConflict { .. }));
    }

    #[test]
    fn merge_with_force_replaces_only_matching_entry() {
        let existing = vec![
            artifact("linux", "amd64", "aa"),
            artifact("darwin", "amd64", "cc"),
        ];
        let merged =
            merge_artifacts(&existing, artifact("linux", "amd64", "bb"), true, "1.0.0").unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].sha256, "bb");
        assert_eq!(merged[1], existing[1]);
    }

    #[test]
    fn merge_appends_new_platform() {
        let existing = vec![artifact("linux", "amd64", "aa")];
        let merged =
            merge_artifacts(&existing, artifact("windows", "amd64", "bb"), false, "1.0.0").unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].os, "windows");
    }

    fn push_request(dir: &Path, force: bool) -> PushRequest {
        let artifact_path = dir.join("tool");
        std::fs::write(&artifact_path, b"tool-bytes").unwrap();
        PushRequest {
            repo_id: "r1".into(),
            repo_name: "Repo 1".into(),
            app_id: "tool".into(),
            app_name: "Tool".into(),
            channel: "stable".into(),
            version: "1.0.0".into(),
            os: "linux".into(),
            arch: "amd64".into(),
            artifact_path,
            force,
        }
    }

    #[tokio::test]
    async fn push_uploads_blob_sidecar_and_manifests() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        let seed = general_purpose::STANDARD.encode([3u8; 32]);
        let req = push_request(tmp.path(), false);

        let manifest = push_release(&backend, &req, &seed).await.expect("push succeeds");

        let blob_path = "apps/tool/releases/v1.0.0/linux/amd64/tool_1.0.0_linux_amd64";
        assert_eq!(backend.object(blob_path).unwrap(), b"tool-bytes");

        let sidecar = backend.object(&format!("{blob_path}.sha256")).unwrap();
        assert_eq!(sidecar, sign::sha256_hex(b"tool-bytes").into_bytes());

        let pub_key = sign::seed_to_pub_key(&seed).unwrap();
        for path in [
            "apps/tool/releases/v1.0.0/artifacts.json",
            "apps/tool/channels/stable.json",
        ] {
            let raw = backend.object(path).unwrap();
            let uploaded: Manifest = serde_json::from_slice(&raw).unwrap();
            uploaded.verify(&pub_key).expect("uploaded manifest verifies");
            assert_eq!(uploaded, manifest);
        }
        assert!(manifest.signature.key_id.starts_with("repo-key-"));
    }

    #[tokio::test]
    async fn push_conflict_aborts_before_any_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        let seed = general_purpose::STANDARD.encode([3u8; 32]);

        let first = push_request(tmp.path(), false);
        push_release(&backend, &first, &seed).await.unwrap();
        let blob_path = "apps/tool/releases/v1.0.0/linux/amd64/tool_1.0.0_linux_amd64";
        let original_blob = backend.object(blob_path).unwrap();

        std::fs::write(tmp.path().join("tool"), b"rebuilt-bytes").unwrap();
        let again = push_request(tmp.path(), false);
        let err = push_release(&backend, &again, &seed).await.unwrap_err();
        assert!(matches!(err, UpdaterError::ReleaseConflict { .. }));

        // The conflict is detected before the blob upload.
        assert_eq!(backend.object(blob_path).unwrap(), original_blob);
    }

    #[tokio::test]
    async fn forced_push_replaces_platform_and_keeps_others() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        let seed = general_purpose::STANDARD.encode([3u8; 32]);

        let linux = push_request(tmp.path(), false);
        push_release(&backend, &linux, &seed).await.unwrap();

        let mut darwin = push_request(tmp.path(), false);
        darwin.os = "darwin".into();
        push_release(&backend, &darwin, &seed).await.unwrap();

        std::fs::write(tmp.path().join("tool"), b"rebuilt-bytes").unwrap();
        let forced = push_request(tmp.path(), true);
        let manifest = push_release(&backend, &forced, &seed).await.unwrap();

        let artifacts = &manifest.payload.latest.artifacts;
        assert_eq!(artifacts.len(), 2);
        let replaced = artifacts.iter().find(|a| a.os == "linux").unwrap();
        assert_eq!(replaced.sha256, sign::sha256_hex(b"rebuilt-bytes"));
        let kept = artifacts.iter().find(|a| a.os == "darwin").unwrap();
        assert_eq!(kept.sha256, sign::sha256_hex(b"tool-bytes"));
    }

    #[tokio::test]
    async fn jar_is_platform_independent() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        let seed = general_purpose::STANDARD.encode([3u8; 32]);

        let jar_path = tmp.path().join("tool.jar");
        std::fs::write(&jar_path, b"jar-bytes").unwrap();
        let mut req = push_request(tmp.path(), false);
        req.artifact_path = jar_path;

        let manifest = push_release(&backend, &req, &seed).await.unwrap();
        let artifact = &manifest.payload.latest.artifacts[0];
        assert_eq!((artifact.os.as_str(), artifact.arch.as_str()), ("any", "any"));
        assert_eq!(artifact.kind, "jar");
        assert!(artifact.url.ends_with("any/any/tool_1.0.0_any_any.jar"));
    }
}
