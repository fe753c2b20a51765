//! Configuration management using meta-achiever.toml

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use meta_achiever_core::{MetaAchieverError, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_PATH: &str = "meta-achiever.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Fallback Steam Web API key for users without their own
    #[serde(default)]
    pub steam_api_key: Option<String>,

    #[serde(default)]
    pub sync: SyncSettings,
}

/// Tuning for the library sync pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("meta_achiever.db")
}

fn default_batch_size() -> usize {
    10
}

fn default_request_delay_ms() -> u64 {
    200
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_lock_ttl_secs() -> u64 {
    30 * 60
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            request_delay_ms: default_request_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            lock_ttl_secs: default_lock_ttl_secs(),
        }
    }
}

impl SyncSettings {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            steam_api_key: None,
            sync: SyncSettings::default(),
        }
    }
}

impl Config {
    /// Load from a TOML file. A missing file yields the defaults; a file that
    /// exists but cannot be read or parsed is a configuration error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| MetaAchieverError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| MetaAchieverError::Config(format!("cannot parse {}: {}", path.display(), e)))?;

        if config.sync.batch_size == 0 {
            return Err(MetaAchieverError::Config("sync.batch_size must be at least 1".to_string()));
        }
        Ok(config)
    }

    /// Load the file, then apply `DATABASE_PATH` and `STEAM_API_KEY` from the environment
    pub fn from_env(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_overrides(
            std::env::var("DATABASE_PATH").ok(),
            std::env::var("STEAM_API_KEY").ok(),
        );
        Ok(config)
    }

    /// Empty values are ignored
    pub fn apply_overrides(&mut self, database_path: Option<String>, steam_api_key: Option<String>) {
        if let Some(path) = database_path.filter(|p| !p.trim().is_empty()) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(key) = steam_api_key.filter(|k| !k.trim().is_empty()) {
            self.steam_api_key = Some(key);
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| MetaAchieverError::Config(e.to_string()))?;
        fs::write(path.as_ref(), content)
            .map_err(|e| MetaAchieverError::Config(format!("cannot write {}: {}", path.as_ref().display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.sync.request_delay(), Duration::from_millis(200));
        assert_eq!(config.sync.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn partial_sync_table_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database_path = \"/var/lib/meta/achiever.db\"").unwrap();
        writeln!(file, "[sync]").unwrap();
        writeln!(file, "batch_size = 25").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/meta/achiever.db"));
        assert_eq!(config.sync.batch_size, 25);
        assert_eq!(config.sync.request_delay_ms, 200);
        assert_eq!(config.steam_api_key, None);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database_path = ").unwrap();
        assert!(matches!(Config::load(file.path()), Err(MetaAchieverError::Config(_))));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\nbatch_size = 0").unwrap();
        assert!(matches!(Config::load(file.path()), Err(MetaAchieverError::Config(_))));
    }

    #[test]
    fn overrides_skip_blank_values() {
        let mut config = Config::default();
        config.apply_overrides(Some("  ".into()), Some("KEY123".into()));
        assert_eq!(config.database_path, default_database_path());
        assert_eq!(config.steam_api_key.as_deref(), Some("KEY123"));
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_PATH);
        let mut config = Config::default();
        config.steam_api_key = Some("abc".into());
        config.sync.lock_ttl_secs = 60;
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }
}
