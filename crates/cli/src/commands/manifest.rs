use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};
use updater::manifest::{sign_manifest, Manifest, Payload};
use updater::secrets::{self, KeyringSecretStore, SecretStore};
use updater::sign;
use zeroize::Zeroizing;

use crate::Globals;

#[derive(Subcommand)]
pub enum ManifestCmd {
    /// Verify a manifest file
    Verify(VerifyArgs),
    /// Sign a payload
    Sign(SignArgs),
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Manifest file to verify
    #[arg(long)]
    pub file: PathBuf,

    /// Path to repository public key
    #[arg(long)]
    pub repo_pubkey: PathBuf,

    /// Expected SHA256 of public key
    #[arg(long = "repo-pubkey-sha256")]
    pub repo_pubkey_sha256: Option<String>,
}

#[derive(Args)]
pub struct SignArgs {
    /// Payload JSON file
    #[arg(long)]
    pub payload: PathBuf,

    /// Output signed manifest file
    #[arg(long)]
    pub out: PathBuf,

    /// Key ID for the signature
    #[arg(long)]
    pub key_id: String,
}

pub fn run(command: ManifestCmd, globals: &Globals) -> Result<()> {
    match command {
        ManifestCmd::Verify(args) => verify(args),
        ManifestCmd::Sign(args) => sign_payload(args, globals),
    }
}

fn verify(args: VerifyArgs) -> Result<()> {
    info!(file = %args.file.display(), "verifying manifest");
    let data = std::fs::read(&args.file).context("failed to read manifest")?;
    let manifest: Manifest = serde_json::from_slice(&data).context("failed to parse manifest")?;

    let pub_key = std::fs::read(&args.repo_pubkey).context("failed to read public key")?;

    if let Some(expected) = &args.repo_pubkey_sha256 {
        debug!(expected = %expected, "verifying public key fingerprint");
        sign::verify_fingerprint(&pub_key, expected)
            .context("public key verification failed")?;
    }

    manifest.verify(&pub_key).context("verification failed")?;
    println!("Manifest verified successfully.");
    Ok(())
}

fn sign_payload(args: SignArgs, globals: &Globals) -> Result<()> {
    info!(payload = %args.payload.display(), out = %args.out.display(), "signing payload");
    let data = std::fs::read(&args.payload).context("failed to read payload")?;
    let payload: Payload = serde_json::from_slice(&data).context("failed to parse payload")?;

    let mut seed = Zeroizing::new(
        std::env::var("ITRUST_REPO_SIGNING_ED25519_SEED_B64").unwrap_or_default(),
    );
    if seed.is_empty() && globals.use_keyring {
        debug!("attempting to get signing seed from keyring");
        if let Ok(stored) =
            KeyringSecretStore.get(secrets::LEGACY_SIGNING_SERVICE, &payload.repo.id)
        {
            seed = Zeroizing::new(stored);
        }
    }
    if seed.is_empty() {
        bail!("signing seed missing (ITRUST_REPO_SIGNING_ED25519_SEED_B64)");
    }

    let manifest = sign_manifest(payload, &seed, &args.key_id).context("signing failed")?;
    let encoded = serde_json::to_vec_pretty(&manifest)?;
    std::fs::write(&args.out, encoded).context("failed to write signed manifest")?;

    println!("Manifest signed and saved to {}", args.out.display());
    Ok(())
}
