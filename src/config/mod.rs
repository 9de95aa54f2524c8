//! Configuration management for docchat

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `api.base_url`
pub const BASE_URL_ENV: &str = "DOCCHAT_API_BASE_URL";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub timeouts: TimeoutConfig,
    pub chat: ChatConfig,
    pub uploads: UploadConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint path is resolved against
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
        }
    }
}

/// Per-endpoint-class request timeouts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub auth_secs: u64,
    pub chat_secs: u64,
    pub default_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            auth_secs: 10,
            chat_secs: 120,
            default_secs: 120,
        }
    }
}

impl TimeoutConfig {
    pub fn auth(&self) -> Duration {
        Duration::from_secs(self.auth_secs)
    }

    pub fn chat(&self) -> Duration {
        Duration::from_secs(self.chat_secs)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    /// Cooldown applied when a 429 carries no usable `Retry-After`
    pub default_retry_after_secs: u64,
    /// Number of leading words used for a thread title
    pub title_words: usize,
    /// Delay between revealed words when printing a reply
    pub reveal_delay_ms: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_retry_after_secs: 60,
            title_words: 4,
            reveal_delay_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    pub poll_interval_secs: u64,
    /// Lowercase file extensions the upload command accepts
    pub accepted_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3,
            accepted_extensions: vec!["pdf".to_string(), "txt".to_string()],
        }
    }
}

impl UploadConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub cooldown_tick_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            cooldown_tick_ms: 1000,
        }
    }
}

impl UiConfig {
    pub fn cooldown_tick(&self) -> Duration {
        Duration::from_millis(self.cooldown_tick_ms.max(100))
    }
}

impl Config {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            tracing::debug!("Loaded configuration from {}", path.display());
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "docchat") {
            let config_dir = proj_dirs.config_dir();
            std::fs::create_dir_all(config_dir)?;
            Ok(config_dir.join("config.toml"))
        } else {
            Ok(PathBuf::from("config.toml"))
        }
    }

    /// Write configuration as TOML
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                self.api.base_url = base_url.trim().to_string();
            }
        }
    }

    /// Parsed base URL, validated once at startup
    pub fn base_url(&self) -> Result<url::Url> {
        url::Url::parse(&self.api.base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api.base_url))
    }
}
