use std::path::PathBuf;

/// Convenient result alias for updater operations.
pub type Result<T> = std::result::Result<T, UpdaterError>;

/// Errors that can occur while publishing or installing a release.
#[derive(thiserror::Error, Debug)]
pub enum UpdaterError {
    /// The signed payload could not be canonicalized.
    #[error("canonicalization failed: {0}")]
    Canonicalization(String),
    /// Network request to the repository failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The repository answered with an unexpected HTTP status.
    #[error("unexpected status {status} for {url}")]
    BackendStatus {
        /// HTTP status code.
        status: u16,
        /// Full request URL.
        url: String,
    },
    /// A manifest or payload could not be decoded from JSON.
    #[error("manifest decoding failed: {0}")]
    ManifestDecode(#[from] serde_json::Error),
    /// The repository public key does not match the pinned fingerprint.
    #[error("public key fingerprint mismatch: expected {expected}, got {actual}")]
    FingerprintMismatch {
        /// Fingerprint pinned by the operator.
        expected: String,
        /// Fingerprint of the key the repository served.
        actual: String,
    },
    /// The signature envelope's payload hash does not match the payload.
    #[error("payload SHA256 mismatch")]
    PayloadShaMismatch,
    /// The manifest signature was invalid.
    #[error("manifest signature invalid")]
    InvalidSignature,
    /// The signature envelope declares an algorithm we do not support.
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlg(String),
    /// The downloaded artifact hash did not match the manifest.
    #[error("artifact integrity check failed (expected {expected}, got {actual})")]
    IntegrityMismatch {
        /// Expected SHA-256 digest.
        expected: String,
        /// Actual SHA-256 digest.
        actual: String,
    },
    /// The release carries no artifact for the requested platform.
    #[error("no artifact found for {os}/{arch}")]
    ArtifactNotFound {
        /// Requested operating system.
        os: String,
        /// Requested architecture.
        arch: String,
    },
    /// The release already contains an artifact for this platform.
    #[error("artifact for {os}/{arch} in version v{version} already exists")]
    ReleaseConflict {
        /// Conflicting operating system.
        os: String,
        /// Conflicting architecture.
        arch: String,
        /// Release version.
        version: String,
    },
    /// Copying the previous binary aside failed; the install was aborted.
    #[error("failed to back up {path:?}: {source}")]
    BackupFailed {
        /// The file that could not be backed up.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The signing seed was malformed.
    #[error("invalid seed: {0}")]
    InvalidSeed(String),
    /// A secret store (keyring) operation failed.
    #[error("secret store error: {0}")]
    Secret(String),
    /// Failed to perform an I/O operation.
    #[error("filesystem operation failed: {0}")]
    Io(#[from] std::io::Error),
    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl UpdaterError {
    /// Helper for wrapping validation failures.
    pub fn validation(msg: impl Into<String>) -> Self {
        UpdaterError::Other(msg.into())
    }
}

impl From<keyring::Error> for UpdaterError {
    fn from(err: keyring::Error) -> Self {
        UpdaterError::Secret(err.to_string())
    }
}
