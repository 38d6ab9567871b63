use anyhow::Result;
use chrono::Local;
use clap::Args;
use tracing::{debug, error, info};
use updater::{fetch, install, paths};

use crate::support;
use crate::Globals;

#[derive(Args)]
pub struct StatusArgs {
    /// Profile name
    pub profile: String,
}

/// Report installed and remote versions. Remote-check failures are
/// informational; the command still exits 0.
pub async fn run(args: StatusArgs, globals: &Globals) -> Result<()> {
    info!(profile = %args.profile, "checking status");
    let (config_dir, state_dir) = paths::resolve(None, None);

    let mut cfg = support::load_merged_config(&config_dir, &args.profile)?;
    support::apply_repo_overlay(&mut cfg, &config_dir);

    let base_url = cfg.get("ITRUST_BASE_URL", "");
    let app_id = cfg.get("ITRUST_APP_ID", "");
    let channel = cfg.get("ITRUST_CHANNEL", "stable");
    let expected_pubkey_sha = cfg.get("ITRUST_REPO_PUBKEY_SHA256", "");
    let backend_type = cfg.get("ITRUST_BACKEND", "nexus");
    let pubkey_path = cfg.get("ITRUST_REPO_PUBKEY_PATH", updater::repo::DEFAULT_PUBKEY_PATH);
    let repo_id = cfg.get("ITRUST_REPO_ID", "");

    let state = install::load_state(&state_dir, &args.profile).unwrap_or_default();
    match &state {
        None => {
            println!("Profile {} is not installed or state is missing.", args.profile);
            info!(profile = %args.profile, "no install state");
            if base_url.is_empty() || app_id.is_empty() {
                return Ok(());
            }
        }
        Some(st) => {
            println!("Profile:           {}", st.profile);
            println!("App ID:            {}", st.app_id);
            println!("Channel:           {}", st.channel);
            println!("Installed Version: {}", st.installed_version);
            println!(
                "Installed At:      {}",
                st.installed_at.with_timezone(&Local).to_rfc3339()
            );
            println!("Destination:       {}", st.dest.display());
        }
    }

    if base_url.is_empty() || app_id.is_empty() || expected_pubkey_sha.is_empty() {
        println!("Latest Version:    unverified (missing configuration for secure check)");
        debug!("missing configuration for secure check");
        return Ok(());
    }

    let creds = match support::resolve_credentials(&cfg, &repo_id, globals) {
        Ok(creds) => creds,
        Err(err) => {
            println!("Latest Version:    unverified ({err})");
            debug!(error = %err, "missing credentials");
            return Ok(());
        }
    };
    let backend = match support::make_backend(&backend_type, &base_url, &creds) {
        Ok(backend) => backend,
        Err(err) => {
            println!("Latest Version:    unverified ({err})");
            error!(error = %err, "backend construction failed");
            return Ok(());
        }
    };

    info!("fetching manifest to check for updates");
    let manifest = match fetch::fetch_and_verify_manifest(
        &backend,
        &app_id,
        &channel,
        "",
        &pubkey_path,
        &expected_pubkey_sha,
    )
    .await
    {
        Ok((manifest, _)) => manifest,
        Err(err) => {
            println!("Latest Version:    unverified ({err})");
            error!(error = %err, "failed to fetch/verify manifest");
            return Ok(());
        }
    };

    println!("Latest Version:    {}", manifest.payload.latest.version);
    if let Some(st) = &state {
        if st.installed_version != manifest.payload.latest.version {
            println!("\nUpdate available!");
        } else {
            println!("\nApplication is up to date.");
        }
    }
    Ok(())
}
