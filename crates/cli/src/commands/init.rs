use anyhow::{bail, Context, Result};
use clap::Args;
use std::fmt::Write as _;
use tracing::{debug, info};
use updater::secrets::{self, KeyringSecretStore, SecretStore};

use crate::prompt;
use crate::Globals;

#[derive(Args)]
pub struct InitArgs {
    /// Profile name
    pub profile: String,

    /// Repository base URL
    #[arg(long)]
    pub base_url: String,

    /// Application ID
    #[arg(long)]
    pub app_id: String,

    /// Update channel
    #[arg(long, default_value = "stable")]
    pub channel: String,

    /// Expected SHA256 of repository public key
    #[arg(long = "repo-pubkey-sha256")]
    pub repo_pubkey_sha256: String,

    /// Destination path for artifact
    #[arg(long)]
    pub dest: String,

    /// Repository backend type
    #[arg(long, default_value = "nexus")]
    pub backend: String,

    /// Repository ID
    #[arg(long)]
    pub repo_id: Option<String>,

    /// Nexus username
    #[arg(long)]
    pub nexus_user: Option<String>,

    /// Store credentials in OS keyring
    #[arg(long)]
    pub store_credentials: bool,

    /// Nexus password (used with --store-credentials)
    #[arg(long)]
    pub nexus_password: Option<String>,
}

pub fn run(args: InitArgs, globals: &Globals) -> Result<()> {
    let config_dir = updater::paths::default_config_dir();
    let profile_path = updater::paths::profile_config_path(&config_dir, &args.profile);
    info!(profile = %args.profile, path = %profile_path.display(), "initializing profile");

    std::fs::create_dir_all(profile_path.parent().expect("profile path has a parent"))
        .context("failed to create config directory")?;

    let mut content = String::new();
    let _ = writeln!(content, "ITRUST_BASE_URL={}", args.base_url);
    let _ = writeln!(content, "ITRUST_APP_ID={}", args.app_id);
    let _ = writeln!(content, "ITRUST_CHANNEL={}", args.channel);
    let _ = writeln!(content, "ITRUST_REPO_PUBKEY_SHA256={}", args.repo_pubkey_sha256);
    let _ = writeln!(content, "ITRUST_DEST={}", args.dest);
    let _ = writeln!(content, "ITRUST_BACKEND={}", args.backend);
    if let Some(repo_id) = &args.repo_id {
        let _ = writeln!(content, "ITRUST_REPO_ID={repo_id}");
    }
    let user = args.nexus_user.clone().unwrap_or_default();
    if !user.is_empty() {
        let _ = writeln!(content, "ITRUST_NEXUS_USERNAME={user}");
    }

    if args.store_credentials {
        let Some(repo_id) = &args.repo_id else {
            bail!("--repo-id is required when using --store-credentials");
        };
        let mut password = args.nexus_password.clone().unwrap_or_default();
        if password.is_empty() && !globals.non_interactive {
            password = prompt::read_password(&format!("Enter password for {user}: "))?.to_string();
        }
        if password.is_empty() {
            bail!("password is required for --store-credentials (provide via --nexus-password or interactive prompt)");
        }

        debug!("storing credentials in OS keyring");
        let store = KeyringSecretStore;
        store
            .set(secrets::SERVICE, &secrets::username_key(repo_id), &user)
            .context("failed to store username in keyring")?;
        store
            .set(secrets::SERVICE, &secrets::password_key(repo_id), &password)
            .context("failed to store password in keyring")?;
        println!("Credentials stored in OS keyring.");
    }

    std::fs::write(&profile_path, &content).context("failed to write profile")?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&profile_path, std::fs::Permissions::from_mode(0o600))?;
    }

    println!("Profile {} initialized at {}", args.profile, profile_path.display());
    info!(profile = %args.profile, "profile initialized");
    Ok(())
}
