//! Plain `KEY=VALUE` configuration files and their merge rules.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;
use tracing::debug;

use crate::error::Result;

/// Environment-variable prefix all recognized keys share.
pub const ENV_PREFIX: &str = "ITRUST_";

/// A flat set of configuration keys and values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    entries: BTreeMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `KEY=VALUE` lines. Blank lines, `#` comments, and lines
    /// without `=` are skipped.
    pub fn parse(reader: impl BufRead) -> Result<Self> {
        let mut config = Config::new();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            config.set(key.trim(), value.trim());
        }
        Ok(config)
    }

    /// Load a config file; a missing file yields an empty config.
    pub fn load_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config");
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Config::new()),
            Err(err) => return Err(err.into()),
        };
        Self::parse(std::io::BufReader::new(file))
    }

    /// Every `ITRUST_*` variable from the process environment.
    pub fn from_env() -> Self {
        let mut config = Config::new();
        for (key, value) in std::env::vars() {
            if key.starts_with(ENV_PREFIX) {
                config.set(&key, &value);
            }
        }
        config
    }

    pub fn get(&self, key: &str, default: &str) -> String {
        self.entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    /// Overlay `other` on top of this config; existing keys are replaced.
    pub fn merge(&mut self, other: Config) {
        self.entries.extend(other.entries);
    }

    /// Set `key` only when it has no value yet.
    pub fn set_default(&mut self, key: &str, value: &str) {
        if !self.contains(key) && !value.is_empty() {
            self.set(key, value);
        }
    }
}

/// Merge configs listed highest-priority first.
pub fn merge_configs(priority: impl IntoIterator<Item = Config>) -> Config {
    let layers: Vec<Config> = priority.into_iter().collect();
    let mut merged = Config::new();
    for layer in layers.into_iter().rev() {
        merged.merge(layer);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_and_trims_lines() {
        let input = "\n# Comment\nKEY1=VALUE1\n  KEY2 = VALUE2  \nINVALID LINE\n";
        let config = Config::parse(Cursor::new(input)).unwrap();

        assert_eq!(config.get("KEY1", ""), "VALUE1");
        assert_eq!(config.get("KEY2", ""), "VALUE2");
        assert!(!config.contains("INVALID LINE"));
        assert_eq!(config.get("MISSING", "fallback"), "fallback");
    }

    #[test]
    fn value_may_contain_equals() {
        let config = Config::parse(Cursor::new("URL=https://x?a=b")).unwrap();
        assert_eq!(config.get("URL", ""), "https://x?a=b");
    }

    #[test]
    fn missing_file_is_empty() {
        let config = Config::load_file(Path::new("/nonexistent/itrust.env")).unwrap();
        assert_eq!(config, Config::new());
    }

    #[test]
    fn merge_order_prefers_first_listed() {
        let mut c1 = Config::new();
        c1.set("A", "1");
        c1.set("B", "1");
        let mut c2 = Config::new();
        c2.set("B", "2");
        c2.set("C", "2");
        let mut c3 = Config::new();
        c3.set("C", "3");
        c3.set("D", "3");

        let merged = merge_configs([c1, c2, c3]);
        assert_eq!(merged.get("A", ""), "1");
        assert_eq!(merged.get("B", ""), "1");
        assert_eq!(merged.get("C", ""), "2");
        assert_eq!(merged.get("D", ""), "3");
    }

    #[test]
    fn set_default_does_not_override() {
        let mut config = Config::new();
        config.set("ITRUST_BASE_URL", "https://a");
        config.set_default("ITRUST_BASE_URL", "https://b");
        config.set_default("ITRUST_CHANNEL", "stable");
        config.set_default("ITRUST_REPO_ID", "");

        assert_eq!(config.get("ITRUST_BASE_URL", ""), "https://a");
        assert_eq!(config.get("ITRUST_CHANNEL", ""), "stable");
        assert!(!config.contains("ITRUST_REPO_ID"));
    }
}
