//! Client configuration management.
//!
//! Configuration is stored at `~/.config/sitecache/config.json` and can be
//! overridden per-process through environment variables:
//!
//! - `SITECACHE_API_URL`: site API base URL
//! - `SITECACHE_DEBOUNCE_MINUTES`: version check debounce window
//! - `SITECACHE_GITHUB_USER`: GitHub account listed on the projects page
//! - `SITECACHE_API_TOKEN`: bearer token for authenticated writes

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::client::DEFAULT_API_URL;
use crate::sync::DEFAULT_DEBOUNCE_WINDOW;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "sitecache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub debounce_minutes: u64,
    pub github_username: Option<String>,
    /// Never written back to disk.
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            debounce_minutes: DEFAULT_DEBOUNCE_WINDOW.as_secs() / 60,
            github_username: None,
            api_token: None,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Self::default()
        };
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir().ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Apply overrides from an environment lookup.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = non_empty("SITECACHE_API_URL") {
            self.api_url = url;
        }
        if let Some(raw) = non_empty("SITECACHE_DEBOUNCE_MINUTES") {
            match raw.parse() {
                Ok(minutes) => self.debounce_minutes = minutes,
                Err(_) => warn!(value = %raw, "Ignoring invalid SITECACHE_DEBOUNCE_MINUTES"),
            }
        }
        if let Some(user) = non_empty("SITECACHE_GITHUB_USER") {
            self.github_username = Some(user);
        }
        if let Some(token) = non_empty("SITECACHE_API_TOKEN") {
            self.api_token = Some(token);
        }
        self
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_secs(self.debounce_minutes.saturating_mul(60))
    }
}
