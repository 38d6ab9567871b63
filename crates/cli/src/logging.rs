use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber once at startup.
///
/// Without a file the human-readable fmt layer writes to stderr; with one it
/// appends to the given path (creating the parent directory). `RUST_LOG`
/// overrides the default `info`/`debug` level.
pub fn init(verbose: bool, log_file: Option<PathBuf>) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                if let Err(err) = std::fs::create_dir_all(dir) {
                    eprintln!("Warning: failed to create log directory {}: {err}", dir.display());
                }
            }
            match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => {
                    tracing_subscriber::fmt()
                        .with_env_filter(filter)
                        .with_writer(Mutex::new(file))
                        .with_ansi(false)
                        .init();
                }
                Err(err) => {
                    eprintln!("Warning: failed to open log file {}: {err}", path.display());
                    tracing_subscriber::fmt()
                        .with_env_filter(filter)
                        .with_writer(std::io::stderr)
                        .init();
                }
            }
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
