//! Typed release manifest and its detached signature envelope.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, UpdaterError};
use crate::{jcs, sign};

/// Signature algorithm accepted by this implementation.
pub const ALG_ED25519: &str = "Ed25519";

/// Detached signature over the canonicalized payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub alg: String,
    pub key_id: String,
    pub created_at: DateTime<Utc>,
    pub payload_sha256: String,
    pub sig: String,
}

/// One installable file for a specific (os, arch) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    pub os: String,
    pub arch: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Repository-relative path of the uploaded object.
    pub url: String,
    pub size: u64,
    /// Lowercase hex SHA-256 of the object bytes.
    pub sha256: String,
}

/// A published release: version plus its per-platform artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub version: String,
    pub release_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    pub artifacts: Vec<Artifact>,
}

/// Repository identity embedded in the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoInfo {
    pub id: String,
    pub name: String,
}

/// Application identity embedded in the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppInfo {
    pub id: String,
    pub name: String,
}

/// The signed portion of a manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub schema_version: u32,
    pub repo: RepoInfo,
    pub app: AppInfo,
    pub channel: String,
    pub generated_at: DateTime<Utc>,
    pub latest: Release,
}

/// Signed release manifest: payload plus detached signature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub payload: Payload,
    pub signature: Signature,
}

/// Repository path of the mutable channel manifest.
pub fn channel_manifest_path(app_id: &str, channel: &str) -> String {
    format!("apps/{app_id}/channels/{channel}.json")
}

/// Repository path of the immutable per-version manifest.
pub fn version_manifest_path(app_id: &str, version: &str) -> String {
    format!("apps/{app_id}/releases/v{version}/artifacts.json")
}

fn canonical_payload(payload: &Payload) -> Result<Vec<u8>> {
    let value = serde_json::to_value(payload)?;
    jcs::canonicalize(&value)
}

/// Sign `payload` with the base64-encoded seed, producing a complete manifest.
pub fn sign_manifest(payload: Payload, seed_b64: &str, key_id: &str) -> Result<Manifest> {
    let canonical = canonical_payload(&payload)?;
    let payload_sha = sign::sha256_hex(&canonical);
    let sig = sign::sign(&canonical, seed_b64)?;

    Ok(Manifest {
        payload,
        signature: Signature {
            alg: ALG_ED25519.to_string(),
            key_id: key_id.to_string(),
            created_at: Utc::now().trunc_subsecs(0),
            payload_sha256: payload_sha,
            sig,
        },
    })
}

impl Manifest {
    /// Verify the envelope against a trusted public key.
    ///
    /// Checks, in order: the declared algorithm, the payload hash, the
    /// Ed25519 signature over the canonicalized payload.
    pub fn verify(&self, pub_key: &[u8]) -> Result<()> {
        if self.signature.alg != ALG_ED25519 {
            return Err(UpdaterError::UnsupportedAlg(self.signature.alg.clone()));
        }
        let canonical = canonical_payload(&self.payload)?;
        if sign::sha256_hex(&canonical) != self.signature.payload_sha256 {
            return Err(UpdaterError::PayloadShaMismatch);
        }
        sign::verify(&canonical, &self.signature.sig, pub_key)
    }

    /// First artifact of the latest release matching (os, arch).
    pub fn find_artifact(&self, os: &str, arch: &str) -> Result<&Artifact> {
        self.payload
            .latest
            .artifacts
            .iter()
            .find(|a| a.os == os && a.arch == arch)
            .ok_or_else(|| UpdaterError::ArtifactNotFound {
                os: os.to_string(),
                arch: arch.to_string(),
            })
    }
}
