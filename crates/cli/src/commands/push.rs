use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::{debug, info};
use updater::config::Config;
use updater::publish::{push_release, PushRequest};

use crate::support;
use crate::Globals;

#[derive(Args)]
pub struct PushArgs {
    /// Project configuration file
    #[arg(long, default_value = "./itrust-updater.project.env")]
    pub config: PathBuf,

    /// Path to the artifact to push
    #[arg(long)]
    pub artifact_path: Option<PathBuf>,

    /// Repository ID
    #[arg(long)]
    pub repo_id: Option<String>,

    /// Application ID
    #[arg(long)]
    pub app_id: Option<String>,

    /// Version to push
    #[arg(long)]
    pub version: Option<String>,

    /// Run pre-push hooks
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub run_hooks: bool,

    /// Allow overwriting an existing release (dangerous)
    #[arg(long)]
    pub force: bool,
}

fn run_prepush_hook(hook: &str, artifact_path: &std::path::Path) -> Result<()> {
    println!("Running pre-push hook: {hook}");
    info!(hook = %hook, "running pre-push hook");

    let mut parts = hook.split_whitespace();
    let Some(program) = parts.next() else {
        return Ok(());
    };
    let status = std::process::Command::new(program)
        .args(parts)
        .env("ITRUST_ARTIFACT_PATH", artifact_path)
        .status()
        .context("failed to start pre-push hook")?;
    if !status.success() {
        bail!("pre-push hook failed: {status}");
    }
    Ok(())
}

pub async fn run(args: PushArgs, globals: &Globals) -> Result<()> {
    info!(config = %args.config.display(), "starting push");
    let mut cfg = Config::load_file(&args.config).context("failed to load project config")?;
    cfg.merge(Config::from_env());

    // Flags beat the merged environment/config.
    let repo_id = args
        .repo_id
        .clone()
        .unwrap_or_else(|| cfg.get("ITRUST_REPO_ID", ""));
    if !repo_id.is_empty() {
        let config_dir = updater::paths::default_config_dir();
        debug!(repo_id = %repo_id, config_dir = %config_dir.display(), "loading repo config");
        if let Ok(rc) = updater::repo::load(&config_dir, &repo_id) {
            cfg.set_default("ITRUST_BASE_URL", &rc.base_url);
        }
    }

    let base_url = cfg.get("ITRUST_BASE_URL", "");
    let app_id = args
        .app_id
        .clone()
        .unwrap_or_else(|| cfg.get("ITRUST_APP_ID", ""));
    let channel = cfg.get("ITRUST_CHANNEL", "stable");
    let version = args
        .version
        .clone()
        .unwrap_or_else(|| cfg.get("ITRUST_VERSION", ""));
    let os = cfg.get("ITRUST_OS", support::host_os());
    let arch = cfg.get("ITRUST_ARCH", support::host_arch());
    let artifact_path = args
        .artifact_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(cfg.get("ITRUST_ARTIFACT_PATH", "")));
    let backend_type = cfg.get("ITRUST_BACKEND", "nexus");
    let repo_name = cfg.get("ITRUST_REPO_NAME", "Default Repo");
    let app_name = cfg.get("ITRUST_APP_NAME", &app_id);

    if base_url.is_empty()
        || app_id.is_empty()
        || version.is_empty()
        || artifact_path.as_os_str().is_empty()
    {
        bail!("missing required project configuration (base-url, app-id, version, artifact-path)");
    }
    info!(app_id = %app_id, version = %version, base_url = %base_url, "pushing release");

    let creds = support::resolve_credentials(&cfg, &repo_id, globals)?;
    let seed = support::resolve_seed(&cfg, &repo_id, globals.use_keyring)?;

    let hook = cfg.get("ITRUST_PREPUSH_HOOK", "");
    if !hook.is_empty() && args.run_hooks {
        run_prepush_hook(&hook, &artifact_path)?;
    }

    let backend = support::make_backend(&backend_type, &base_url, &creds)?;
    let request = PushRequest {
        repo_id,
        repo_name,
        app_id: app_id.clone(),
        app_name,
        channel,
        version: version.clone(),
        os,
        arch,
        artifact_path,
        force: args.force,
    };

    push_release(&backend, &request, &seed).await?;

    println!("Push successful!");
    info!(app_id = %app_id, version = %version, "push successful");
    Ok(())
}
