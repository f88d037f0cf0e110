//! Configuration for the capture core.
//!
//! Sources (highest priority first):
//! 1. Environment variables (TUYET_HOME, TUYET_BRIDGE_URL, ...)
//! 2. Config file ($TUYET_HOME/config.yaml)
//! 3. Defaults (~/.tuyet)
//!
//! The resolved config is a plain value handed to whoever builds the store
//! and worker; there is no global handle.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::retention::RETENTION_DAYS;
use crate::sync::MAX_RETRIES;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub bridge: Option<BridgeSection>,
    #[serde(default)]
    pub transcription: Option<TranscriptionSection>,
    #[serde(default)]
    pub sync: Option<SyncSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeSection {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub vault_folder: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptionSection {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncSection {
    pub max_retries: Option<u32>,
    pub retention_days: Option<i64>,
}

/// Resolved configuration passed explicitly to every component.
#[derive(Debug, Clone)]
pub struct Config {
    /// State directory holding the database and queue log
    pub home: PathBuf,
    /// Vault bridge endpoint; `None` means unconfigured
    pub bridge_url: Option<String>,
    pub bridge_key: String,
    /// Folder inside the vault for daily notes
    pub vault_folder: String,
    /// Transcription endpoint; `None` means unconfigured
    pub transcribe_url: Option<String>,
    pub transcribe_key: Option<String>,
    pub max_retries: u32,
    pub retention_days: i64,
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.home.join("tuyet.db")
    }

    pub fn queue_path(&self) -> PathBuf {
        self.home.join("offline_queue.jsonl")
    }

    /// Load configuration from the default home.
    pub fn load() -> Result<Self> {
        let home = match std::env::var("TUYET_HOME") {
            Ok(home) => PathBuf::from(home),
            Err(_) => dirs::home_dir()
                .context("Failed to determine home directory")?
                .join(".tuyet"),
        };
        Self::load_from(&home)
    }

    /// Load configuration rooted at an explicit home directory.
    pub fn load_from(home: &Path) -> Result<Self> {
        let config_path = home.join("config.yaml");
        let file = if config_path.exists() {
            load_config_file(&config_path)?
        } else {
            ConfigFile::default()
        };

        let bridge = file.bridge.unwrap_or_default();
        let transcription = file.transcription.unwrap_or_default();
        let sync = file.sync.unwrap_or_default();

        let bridge_url = env_or("TUYET_BRIDGE_URL", bridge.url);
        let transcribe_url = env_or("TUYET_TRANSCRIBE_URL", transcription.url);

        Ok(Self {
            home: home.to_path_buf(),
            bridge_url: bridge_url.filter(|u| !u.is_empty()),
            bridge_key: env_or("TUYET_BRIDGE_KEY", bridge.api_key).unwrap_or_default(),
            vault_folder: env_or("TUYET_VAULT_FOLDER", bridge.vault_folder)
                .unwrap_or_else(|| "Tuyet".to_string()),
            transcribe_url: transcribe_url.filter(|u| !u.is_empty()),
            transcribe_key: env_or("TUYET_TRANSCRIBE_KEY", transcription.api_key),
            max_retries: sync.max_retries.unwrap_or(MAX_RETRIES),
            retention_days: sync.retention_days.unwrap_or(RETENTION_DAYS),
        })
    }
}

fn env_or(var: &str, fallback: Option<String>) -> Option<String> {
    std::env::var(var).ok().or(fallback)
}

fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_config_file() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from(temp.path()).unwrap();

        assert_eq!(config.home, temp.path());
        assert!(config.bridge_url.is_none());
        assert!(config.transcribe_url.is_none());
        assert_eq!(config.vault_folder, "Tuyet");
        assert_eq!(config.max_retries, MAX_RETRIES);
        assert_eq!(config.retention_days, RETENTION_DAYS);
        assert_eq!(config.db_path(), temp.path().join("tuyet.db"));
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
bridge:
  url: http://localhost:3001
  api_key: secret
  vault_folder: Notes
transcription:
  url: http://localhost:8080/transcribe
sync:
  max_retries: 3
  retention_days: 14
"#
        )
        .unwrap();

        let config = Config::load_from(temp.path()).unwrap();
        assert_eq!(config.bridge_url.as_deref(), Some("http://localhost:3001"));
        assert_eq!(config.bridge_key, "secret");
        assert_eq!(config.vault_folder, "Notes");
        assert_eq!(
            config.transcribe_url.as_deref(),
            Some("http://localhost:8080/transcribe")
        );
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retention_days, 14);
    }

    #[test]
    fn test_empty_url_is_unconfigured() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.yaml");
        std::fs::write(&config_path, "bridge:\n  url: \"\"\n").unwrap();

        let config = Config::load_from(temp.path()).unwrap();
        assert!(config.bridge_url.is_none());
    }
}
