use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use clap::{Args, Subcommand};
use rand::RngCore;
use std::fmt::Write as _;
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use updater::backend::{Backend, OpenBody};
use updater::config::Config;
use updater::nexus::NexusBackend;
use updater::repo::{self, RepoConfig, DEFAULT_PUBKEY_PATH};
use updater::secrets::{self, KeyringSecretStore, SecretStore};
use updater::sign;
use zeroize::Zeroizing;

use crate::prompt;
use crate::Globals;

#[derive(Subcommand)]
pub enum RepoCmd {
    /// Initialize a new repository
    Init(InitArgs),
    /// Show repository configuration
    Config(ConfigArgs),
    /// Export repository configuration and secrets
    Export(ExportArgs),
    /// Import repository configuration and secrets
    Import(ImportArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Repository ID
    #[arg(long)]
    pub repo_id: String,

    /// Repository base URL
    #[arg(long)]
    pub base_url: String,

    /// Nexus username
    #[arg(long)]
    pub nexus_user: String,

    /// Nexus password (prompted if missing)
    #[arg(long)]
    pub nexus_password: Option<String>,

    /// Path in repository for public key
    #[arg(long, default_value = DEFAULT_PUBKEY_PATH)]
    pub pubkey_path: String,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Repository ID
    #[arg(long)]
    pub repo_id: String,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Repository ID
    #[arg(long)]
    pub repo_id: String,

    /// Include signing seed in export
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub include_seed: bool,

    /// Include Nexus credentials in export
    #[arg(long)]
    pub include_nexus: bool,

    /// Output file path (default: stdout)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Input file path (default: stdin)
    #[arg(long)]
    pub r#in: Option<PathBuf>,

    /// Write repo configuration file
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub write_repo_config: bool,
}

pub async fn run(command: RepoCmd, globals: &Globals) -> Result<()> {
    match command {
        RepoCmd::Init(args) => init(args, globals).await,
        RepoCmd::Config(args) => config(args),
        RepoCmd::Export(args) => export(args, globals),
        RepoCmd::Import(args) => import(args, globals),
    }
}

async fn init(args: InitArgs, globals: &Globals) -> Result<()> {
    info!(repo_id = %args.repo_id, base_url = %args.base_url, "initializing repository");

    let mut password = Zeroizing::new(args.nexus_password.clone().unwrap_or_default());
    if password.is_empty() && !globals.non_interactive {
        password = prompt::read_password(&format!("Enter password for {}: ", args.nexus_user))?;
    }
    if password.is_empty() {
        bail!("password is required");
    }

    let mut seed = Zeroizing::new([0u8; 32]);
    rand::thread_rng().fill_bytes(&mut *seed);
    let seed_b64 = Zeroizing::new(general_purpose::STANDARD.encode(&*seed));
    let pub_key = sign::seed_to_pub_key(&seed_b64).context("failed to derive public key")?;
    let pub_key_sha = sign::sha256_hex(&pub_key);

    info!(path = %args.pubkey_path, "uploading public key");
    let backend = NexusBackend::new(&args.base_url, &args.nexus_user, &password);
    backend
        .put(
            &args.pubkey_path,
            &OpenBody::from_bytes(pub_key.to_vec()),
            "application/octet-stream",
        )
        .await
        .context("failed to upload public key")?;

    let rc = RepoConfig {
        repo_id: args.repo_id.clone(),
        base_url: args.base_url.clone(),
        pubkey_path: args.pubkey_path.clone(),
        pubkey_sha256: pub_key_sha.clone(),
    };
    let config_dir = updater::paths::default_config_dir();
    repo::save(&config_dir, &rc).context("failed to save repo config")?;

    if globals.use_keyring {
        debug!("storing repository secrets in keyring");
        let store = KeyringSecretStore;
        let _ = store.set(secrets::SERVICE, &secrets::username_key(&args.repo_id), &args.nexus_user);
        let _ = store.set(secrets::SERVICE, &secrets::password_key(&args.repo_id), &password);
        let _ = store.set(secrets::SERVICE, &secrets::seed_key(&args.repo_id), &seed_b64);
        println!("Secrets stored in keyring.");
    } else {
        println!("\nIMPORTANT: Store this signing seed securely (it will NOT be saved to disk):");
        println!("{}", seed_b64.as_str());
    }

    println!("\nRepository {} initialized.", args.repo_id);
    println!("\nClient config snippet (use for profile init):");
    println!("-------------------------------------------");
    println!("ITRUST_REPO_ID={}", args.repo_id);
    println!("ITRUST_BASE_URL={}", args.base_url);
    println!("ITRUST_REPO_PUBKEY_SHA256={pub_key_sha}");
    println!("ITRUST_REPO_PUBKEY_PATH={}", args.pubkey_path);
    println!("-------------------------------------------");
    Ok(())
}

fn config(args: ConfigArgs) -> Result<()> {
    let config_dir = updater::paths::default_config_dir();
    let rc = repo::load(&config_dir, &args.repo_id)
        .with_context(|| format!("failed to load repo config for {}", args.repo_id))?;

    println!("Repo config snippet for {}:", args.repo_id);
    println!("-------------------------------------------");
    print!("{}", repo::to_env_snippet(&rc));
    println!("-------------------------------------------");
    Ok(())
}

fn export(args: ExportArgs, globals: &Globals) -> Result<()> {
    info!(repo_id = %args.repo_id, "exporting repo config");
    let config_dir = updater::paths::default_config_dir();
    let rc = repo::load(&config_dir, &args.repo_id).context("failed to load repo config")?;

    let mut out = repo::to_env_snippet(&rc);

    if globals.use_keyring {
        let store = KeyringSecretStore;
        if args.include_seed {
            match store.get(secrets::SERVICE, &secrets::seed_key(&args.repo_id)) {
                Ok(seed) => {
                    let _ = writeln!(out, "ITRUST_REPO_SIGNING_ED25519_SEED_B64={seed}");
                }
                Err(_) => warn!(repo_id = %args.repo_id, "could not find seed in keyring"),
            }
        }
        if args.include_nexus {
            let user = store
                .get(secrets::SERVICE, &secrets::username_key(&args.repo_id))
                .unwrap_or_default();
            let pass = store
                .get(secrets::SERVICE, &secrets::password_key(&args.repo_id))
                .unwrap_or_default();
            if !user.is_empty() {
                let _ = writeln!(out, "ITRUST_NEXUS_USERNAME={user}");
            }
            if !pass.is_empty() {
                let _ = writeln!(out, "ITRUST_NEXUS_PASSWORD={pass}");
            }
        }
    }

    match &args.out {
        Some(path) => {
            std::fs::write(path, &out).context("failed to write export")?;
            println!("Repo {} exported to {}", args.repo_id, path.display());
        }
        None => {
            println!("WARNING: Bundle contains secrets!");
            println!("-------------------------------------------");
            print!("{out}");
            println!("-------------------------------------------");
        }
    }
    Ok(())
}

fn import(args: ImportArgs, globals: &Globals) -> Result<()> {
    let data = match &args.r#in {
        Some(path) => {
            info!(path = %path.display(), "importing repo config");
            std::fs::read_to_string(path).context("failed to read input")?
        }
        None => {
            info!("importing repo config from stdin");
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read input")?;
            buf
        }
    };

    let cfg = Config::parse(std::io::Cursor::new(data))?;
    let repo_id = cfg.get("ITRUST_REPO_ID", "");
    if repo_id.is_empty() {
        bail!("input does not contain ITRUST_REPO_ID");
    }

    if args.write_repo_config {
        let rc = RepoConfig {
            repo_id: repo_id.clone(),
            base_url: cfg.get("ITRUST_BASE_URL", ""),
            pubkey_path: cfg.get("ITRUST_REPO_PUBKEY_PATH", DEFAULT_PUBKEY_PATH),
            pubkey_sha256: cfg.get("ITRUST_REPO_PUBKEY_SHA256", ""),
        };
        let config_dir = updater::paths::default_config_dir();
        match repo::save(&config_dir, &rc) {
            Ok(()) => println!("Repo config for {repo_id} saved."),
            Err(err) => tracing::error!(error = %err, "failed to save repo config"),
        }
    }

    if globals.use_keyring {
        debug!("importing secrets to keyring");
        let store = KeyringSecretStore;
        let seed = cfg.get("ITRUST_REPO_SIGNING_ED25519_SEED_B64", "");
        if !seed.is_empty() {
            let _ = store.set(secrets::SERVICE, &secrets::seed_key(&repo_id), &seed);
            println!("Signing seed imported to keyring.");
        }
        let user = cfg.get("ITRUST_NEXUS_USERNAME", "");
        let pass = cfg.get("ITRUST_NEXUS_PASSWORD", "");
        if !user.is_empty() {
            let _ = store.set(secrets::SERVICE, &secrets::username_key(&repo_id), &user);
            if !pass.is_empty() {
                let _ = store.set(secrets::SERVICE, &secrets::password_key(&repo_id), &pass);
            }
            println!("Nexus credentials imported to keyring.");
        }
    } else {
        println!("Keyring not enabled, secrets not imported.");
    }
    Ok(())
}
