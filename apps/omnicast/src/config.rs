//! Settings and stored credentials
//!
//! Both live as JSON files under `<config_dir>/omnicast/`. A missing or
//! unreadable settings file falls back to defaults with a warning.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

const APP_DIR: &str = "omnicast";
const CONFIG_FILE: &str = "config.json";
const STORAGE_FILE: &str = "storage.json";

/// Storage key of the script endpoint token
pub const TOKEN_KEY: &str = "pollinations_token";

/// `<config_dir>/omnicast/<file>`
fn app_file(file: &str) -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push(APP_DIR);
    path.push(file);
    Some(path)
}

fn ensure_parent(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Endpoints, pacing and output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CastConfig {
    /// Speech endpoint; text is appended as a path segment
    pub speech_url: String,
    pub speech_model: String,
    /// Script-writing endpoint (POST)
    pub script_url: String,
    pub script_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    /// Delay between synthesis calls in a batch
    pub pacing_ms: u64,
    /// Delay between staggered downloads
    pub download_stagger_ms: u64,
    /// Background resync threshold in seconds
    pub drift_threshold_secs: f64,
    pub download_dir: Option<PathBuf>,
}

impl Default for CastConfig {
    fn default() -> Self {
        Self {
            speech_url: "https://text.pollinations.ai".to_string(),
            speech_model: "openai-audio".to_string(),
            script_url: "https://text.pollinations.ai/".to_string(),
            script_model: "openai".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            request_timeout_secs: 30,
            pacing_ms: 2000,
            download_stagger_ms: 500,
            drift_threshold_secs: 0.5,
            download_dir: None,
        }
    }
}

impl CastConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn download_stagger(&self) -> Duration {
        Duration::from_millis(self.download_stagger_ms)
    }

    /// Configured download directory, else the platform one, else the working directory
    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn config_path() -> Option<PathBuf> {
        app_file(CONFIG_FILE)
    }

    /// Load from the user's config directory
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                ::log::warn!("Cannot determine config directory, using default settings");
                Self::default()
            }
        }
    }

    /// Load from `path`, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<CastConfig>(&content) {
                Ok(config) => {
                    ::log::info!("Loaded settings from {}", path.display());
                    config
                }
                Err(e) => {
                    ::log::warn!("Failed to parse settings: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ::log::debug!("Settings file not found, using defaults");
                Self::default()
            }
            Err(e) => {
                ::log::warn!("Failed to read settings: {}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        ensure_parent(path)?;
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        ::log::debug!("Saved settings to {}", path.display());
        Ok(())
    }
}

// ============================================================================
// CREDENTIALS
// ============================================================================

/// Small persistent key/value store holding the script endpoint token
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl CredentialStore {
    /// Open the store in the user's config directory
    pub fn load() -> Result<Self, ConfigError> {
        let path = app_file(STORAGE_FILE).ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::load_from(path))
    }

    /// Open the store at `path`; unreadable content starts empty
    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                ::log::warn!("Failed to parse credential store: {}, starting empty", e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                ::log::warn!("Failed to read credential store: {}, starting empty", e);
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    pub fn token(&self) -> Option<&str> {
        self.entries
            .get(TOKEN_KEY)
            .map(String::as_str)
            .filter(|t| !t.is_empty())
    }

    /// Store a token; an empty value clears it
    pub fn set_token(&mut self, token: &str) -> Result<(), ConfigError> {
        let token = token.trim();
        if token.is_empty() {
            return self.clear();
        }
        self.entries.insert(TOKEN_KEY.to_string(), token.to_string());
        self.save()
    }

    pub fn clear(&mut self) -> Result<(), ConfigError> {
        self.entries.remove(TOKEN_KEY);
        self.save()
    }

    fn save(&self) -> Result<(), ConfigError> {
        ensure_parent(&self.path)?;
        fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        ::log::debug!("Saved credential store to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = CastConfig::default();
        assert_eq!(config.pacing(), Duration::from_millis(2000));
        assert_eq!(config.download_stagger(), Duration::from_millis(500));
        assert_eq!(config.speech_model, "openai-audio");
        assert_eq!(config.max_tokens, 2000);
    }

    #[test]
    fn test_missing_or_malformed_settings_fall_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert_eq!(CastConfig::load_from(&path), CastConfig::default());

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(CastConfig::load_from(&path), CastConfig::default());
    }

    #[test]
    fn test_partial_settings_keep_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "pacing_ms": 1500 }"#).unwrap();

        let config = CastConfig::load_from(&path);
        assert_eq!(config.pacing_ms, 1500);
        assert_eq!(config.speech_url, "https://text.pollinations.ai");
    }

    #[test]
    fn test_settings_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = CastConfig {
            download_dir: Some(dir.path().to_path_buf()),
            ..CastConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(CastConfig::load_from(&path), config);
        assert_eq!(config.resolved_download_dir(), dir.path());
    }

    #[test]
    fn test_token_lifecycle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let mut store = CredentialStore::load_from(&path);
        assert_eq!(store.token(), None);

        store.set_token("  secret-token ").unwrap();
        assert_eq!(CredentialStore::load_from(&path).token(), Some("secret-token"));

        let stored: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored.get(TOKEN_KEY).map(String::as_str), Some("secret-token"));

        store.set_token("").unwrap();
        assert_eq!(CredentialStore::load_from(&path).token(), None);

        store.set_token("again").unwrap();
        store.clear().unwrap();
        assert_eq!(CredentialStore::load_from(&path).token(), None);
    }
}
