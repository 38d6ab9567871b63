//! Default filesystem locations for configuration, state, and logs.

use std::path::PathBuf;

const APP_DIR: &str = "itrust-updater";

/// Resolve config and state directories, honoring explicit overrides.
pub fn resolve(custom_config_dir: Option<PathBuf>, custom_state_dir: Option<PathBuf>) -> (PathBuf, PathBuf) {
    (
        custom_config_dir.unwrap_or_else(default_config_dir),
        custom_state_dir.unwrap_or_else(default_state_dir),
    )
}

/// `%APPDATA%\itrust-updater`, `/etc/itrust-updater` for root, else
/// `~/.config/itrust-updater`.
pub fn default_config_dir() -> PathBuf {
    #[cfg(windows)]
    {
        return env_dir("APPDATA").join(APP_DIR);
    }
    #[cfg(unix)]
    {
        if is_root() {
            return PathBuf::from("/etc").join(APP_DIR);
        }
        home().join(".config").join(APP_DIR)
    }
}

/// `%LOCALAPPDATA%\itrust-updater`, `/var/lib/itrust-updater` for root,
/// else `~/.local/state/itrust-updater`.
pub fn default_state_dir() -> PathBuf {
    #[cfg(windows)]
    {
        return env_dir("LOCALAPPDATA").join(APP_DIR);
    }
    #[cfg(unix)]
    {
        if is_root() {
            return PathBuf::from("/var/lib").join(APP_DIR);
        }
        home().join(".local").join("state").join(APP_DIR)
    }
}

/// Per-platform log directory used when file logging is enabled without an
/// explicit path.
pub fn default_log_dir() -> PathBuf {
    #[cfg(windows)]
    {
        return env_dir("LOCALAPPDATA").join(APP_DIR).join("logs");
    }
    #[cfg(target_os = "macos")]
    {
        return home().join("Library/Logs").join(APP_DIR);
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        if is_root() {
            return PathBuf::from("/var/log").join(APP_DIR);
        }
        home().join(".local").join("state").join(APP_DIR).join("logs")
    }
}

/// Profile config file: `<config>/apps/<profile>.env`.
pub fn profile_config_path(config_dir: &std::path::Path, profile: &str) -> PathBuf {
    config_dir.join("apps").join(format!("{profile}.env"))
}

#[cfg(unix)]
fn is_root() -> bool {
    // Effective uid decides whether system-wide directories apply.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(unix)]
fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(windows)]
fn env_dir(var: &str) -> PathBuf {
    std::env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
