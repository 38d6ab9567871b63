//! Trust-anchored manifest retrieval.

use tracing::debug;

use crate::backend::{read_all, Backend};
use crate::error::Result;
use crate::manifest::{channel_manifest_path, version_manifest_path, Manifest};
use crate::sign;

/// Fetch the repository public key, check it against the pinned
/// fingerprint, then fetch and verify the requested manifest.
///
/// An empty or `"latest"` version selects the channel manifest; anything
/// else selects the immutable per-version manifest. Nothing served by the
/// backend is trusted before the fingerprint check passes. Returns the
/// verified manifest together with the trusted public key bytes.
pub async fn fetch_and_verify_manifest(
    backend: &dyn Backend,
    app_id: &str,
    channel: &str,
    version: &str,
    pubkey_path: &str,
    expected_pubkey_sha: &str,
) -> Result<(Manifest, Vec<u8>)> {
    let pub_key = read_all(backend.get(pubkey_path).await?).await?;
    sign::verify_fingerprint(&pub_key, expected_pubkey_sha)?;

    let manifest_path = if version.is_empty() || version == "latest" {
        channel_manifest_path(app_id, channel)
    } else {
        version_manifest_path(app_id, version)
    };
    debug!(path = %manifest_path, "fetching manifest");

    let raw = read_all(backend.get(&manifest_path).await?).await?;
    let manifest: Manifest = serde_json::from_slice(&raw)?;
    manifest.verify(&pub_key)?;

    Ok((manifest, pub_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::error::UpdaterError;
    use crate::manifest::{sign_manifest, AppInfo, Artifact, Payload, Release, RepoInfo};
    use base64::{engine::general_purpose, Engine as _};
    use chrono::{SubsecRound, Utc};

    fn seed_b64() -> String {
        general_purpose::STANDARD.encode([9u8; 32])
    }

    fn signed_manifest(channel: &str, version: &str) -> Manifest {
        let now = Utc::now().trunc_subsecs(0);
        let payload = Payload {
            schema_version: 1,
            repo: RepoInfo { id: "r1".into(), name: "Repo 1".into() },
            app: AppInfo { id: "app1".into(), name: "App 1".into() },
            channel: channel.into(),
            generated_at: now,
            latest: Release {
                version: version.into(),
                release_date: now,
                notes: String::new(),
                artifacts: vec![Artifact {
                    os: "linux".into(),
                    arch: "amd64".into(),
                    kind: "binary".into(),
                    url: format!("apps/app1/releases/v{version}/linux/amd64/app1"),
                    size: 7,
                    sha256: "ed7002b439e9ac845f22357d822bac1444730fbdb6016d3ec9432297b9ec9f73"
                        .into(),
                }],
            },
        };
        sign_manifest(payload, &seed_b64(), "test-key").unwrap()
    }

    fn backend_with_key() -> (MemoryBackend, String) {
        let pub_key = sign::seed_to_pub_key(&seed_b64()).unwrap();
        let pin = sign::sha256_hex(&pub_key);
        let backend = MemoryBackend::new();
        backend.insert("repo/public-keys/ed25519.pub", pub_key.to_vec());
        (backend, pin)
    }

    #[tokio::test]
    async fn resolves_channel_manifest_for_latest() {
        let (backend, pin) = backend_with_key();
        let manifest = signed_manifest("stable", "1.2.3");
        backend.insert(
            "apps/app1/channels/stable.json",
            serde_json::to_vec(&manifest).unwrap(),
        );

        for version in ["", "latest"] {
            let (fetched, _) = fetch_and_verify_manifest(
                &backend,
                "app1",
                "stable",
                version,
                "repo/public-keys/ed25519.pub",
                &pin,
            )
            .await
            .expect("fetch succeeds");
            assert_eq!(fetched.payload.latest.version, "1.2.3");
        }
    }

    #[tokio::test]
    async fn resolves_version_manifest_for_pinned_version() {
        let (backend, pin) = backend_with_key();
        let manifest = signed_manifest("stable", "2.0.0");
        backend.insert(
            "apps/app1/releases/v2.0.0/artifacts.json",
            serde_json::to_vec(&manifest).unwrap(),
        );

        let (fetched, _) = fetch_and_verify_manifest(
            &backend,
            "app1",
            "stable",
            "2.0.0",
            "repo/public-keys/ed25519.pub",
            &pin,
        )
        .await
        .expect("fetch succeeds");
        assert_eq!(fetched.payload.latest.version, "2.0.0");
    }

    #[tokio::test]
    async fn wrong_pin_rejects_before_manifest_fetch() {
        let (backend, _) = backend_with_key();
        // No manifest uploaded: the fingerprint check must fail first.
        let err = fetch_and_verify_manifest(
            &backend,
            "app1",
            "stable",
            "",
            "repo/public-keys/ed25519.pub",
            &"0".repeat(64),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UpdaterError::FingerprintMismatch { .. }));
    }

    #[tokio::test]
    async fn tampered_manifest_is_rejected() {
        let (backend, pin) = backend_with_key();
        let mut manifest = signed_manifest("stable", "1.2.3");
        manifest.payload.latest.version = "9.9.9".into();
        backend.insert(
            "apps/app1/channels/stable.json",
            serde_json::to_vec(&manifest).unwrap(),
        );

        let err = fetch_and_verify_manifest(
            &backend,
            "app1",
            "stable",
            "",
            "repo/public-keys/ed25519.pub",
            &pin,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UpdaterError::PayloadShaMismatch));
    }
}
