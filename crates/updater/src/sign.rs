//! Ed25519 signing and SHA-256 hashing primitives.
//!
//! The publisher's secret is a 32-byte Ed25519 seed, exchanged base64
//! encoded. Public keys travel as the raw 32 key bytes (no PEM), and the
//! client pins them by the lowercase-hex SHA-256 of those bytes.

use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use zeroize::Zeroizing;

use crate::error::{Result, UpdaterError};

/// Length of an Ed25519 seed in bytes.
pub const SEED_LEN: usize = 32;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Streaming SHA-256 hasher for inline hashing of downloads.
pub struct Hasher {
    inner: Sha256,
}

impl Hasher {
    pub fn new() -> Self {
        Self { inner: Sha256::new() }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
    }

    /// Finish hashing and return the lowercase hex digest.
    pub fn finalize(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a file on disk without loading it into memory.
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Check a public key against its pinned fingerprint.
///
/// The fingerprint is the lowercase-hex SHA-256 of the raw key bytes. On
/// mismatch the key must not be used for any further verification.
pub fn verify_fingerprint(pub_key: &[u8], expected_hex: &str) -> Result<()> {
    let actual = sha256_hex(pub_key);
    if actual != expected_hex {
        return Err(UpdaterError::FingerprintMismatch {
            expected: expected_hex.to_string(),
            actual,
        });
    }
    Ok(())
}

fn decode_seed(seed_b64: &str) -> Result<Zeroizing<[u8; SEED_LEN]>> {
    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(seed_b64)
            .map_err(|err| UpdaterError::InvalidSeed(format!("malformed base64: {err}")))?,
    );
    if raw.len() != SEED_LEN {
        return Err(UpdaterError::InvalidSeed(format!(
            "expected {SEED_LEN} bytes, got {}",
            raw.len()
        )));
    }
    let mut seed = Zeroizing::new([0u8; SEED_LEN]);
    seed.copy_from_slice(&raw);
    Ok(seed)
}

/// Sign `message` with the base64-encoded seed, returning the base64 of the
/// 64 raw signature bytes.
pub fn sign(message: &[u8], seed_b64: &str) -> Result<String> {
    let seed = decode_seed(seed_b64)?;
    let key = SigningKey::from_bytes(&seed);
    let signature = key.sign(message);
    Ok(general_purpose::STANDARD.encode(signature.to_bytes()))
}

/// Verify a base64-encoded detached signature over `message`.
pub fn verify(message: &[u8], sig_b64: &str, pub_key: &[u8]) -> Result<()> {
    let raw = general_purpose::STANDARD
        .decode(sig_b64)
        .map_err(|_| UpdaterError::InvalidSignature)?;
    let sig_bytes: [u8; 64] = raw.try_into().map_err(|_| UpdaterError::InvalidSignature)?;
    let signature = Signature::from_bytes(&sig_bytes);

    let key_bytes: [u8; 32] = pub_key
        .try_into()
        .map_err(|_| UpdaterError::validation("public key must be 32 bytes"))?;
    let key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|_| UpdaterError::validation("malformed Ed25519 public key"))?;

    key.verify(message, &signature)
        .map_err(|_| UpdaterError::InvalidSignature)
}

/// Derive the raw 32-byte public key from a base64-encoded seed.
pub fn seed_to_pub_key(seed_b64: &str) -> Result<[u8; 32]> {
    let seed = decode_seed(seed_b64)?;
    let key = SigningKey::from_bytes(&seed);
    Ok(key.verifying_key().to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_seed_b64() -> String {
        general_purpose::STANDARD.encode([0u8; SEED_LEN])
    }

    #[test]
    fn sign_verify_roundtrip() {
        let seed = zero_seed_b64();
        let message = b"hello world";

        let sig = sign(message, &seed).expect("sign succeeds");
        let pub_key = seed_to_pub_key(&seed).expect("pubkey derivation succeeds");

        verify(message, &sig, &pub_key).expect("verify succeeds");
        assert!(matches!(
            verify(b"corrupted", &sig, &pub_key),
            Err(UpdaterError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_short_seed() {
        let short = general_purpose::STANDARD.encode([0u8; 16]);
        assert!(matches!(sign(b"x", &short), Err(UpdaterError::InvalidSeed(_))));
        assert!(matches!(seed_to_pub_key(&short), Err(UpdaterError::InvalidSeed(_))));
    }

    #[test]
    fn rejects_malformed_signature() {
        let pub_key = seed_to_pub_key(&zero_seed_b64()).unwrap();
        assert!(matches!(
            verify(b"x", "not base64!!!", &pub_key),
            Err(UpdaterError::InvalidSignature)
        ));
        let short = general_purpose::STANDARD.encode([0u8; 10]);
        assert!(matches!(
            verify(b"x", &short, &pub_key),
            Err(UpdaterError::InvalidSignature)
        ));
    }

    #[test]
    fn fingerprint_match_and_mismatch() {
        let pub_key = b"some public key";
        let expected = sha256_hex(pub_key);

        verify_fingerprint(pub_key, &expected).expect("matching fingerprint accepted");

        let err = verify_fingerprint(pub_key, &"0".repeat(64)).unwrap_err();
        assert!(matches!(err, UpdaterError::FingerprintMismatch { .. }));
    }

    #[test]
    fn streaming_hasher_matches_one_shot() {
        let mut hasher = Hasher::new();
        hasher.update(b"con");
        hasher.update(b"tent");
        assert_eq!(hasher.finalize(), sha256_hex(b"content"));
        assert_eq!(
            sha256_hex(b"content"),
            "ed7002b439e9ac845f22357d822bac1444730fbdb6016d3ec9432297b9ec9f73"
        );
    }
}
