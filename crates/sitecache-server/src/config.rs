use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Allowed browser origins; `*` allows any.
    pub cors_origins: Vec<String>,
    /// Directory holding `profile.json`, `todos.json` and `config.json`.
    /// Without one the server starts with an empty in-memory source.
    pub data_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match lookup("PORT").filter(|v| !v.trim().is_empty()) {
            Some(raw) => raw.trim().parse().with_context(|| format!("Invalid PORT value: {raw}"))?,
            None => {
                info!("PORT not set, using default: {DEFAULT_PORT}");
                DEFAULT_PORT
            }
        };

        let origins = lookup("CORS_ORIGINS").unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string());
        let cors_origins = origins
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let data_dir = lookup("SITECACHE_DATA_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            port,
            cors_origins,
            data_dir,
        })
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173", "http://localhost:3000"]);
        assert_eq!(config.data_dir, None);
        assert!(!config.allows_any_origin());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(|key| match key {
            "PORT" => Some("8080".to_string()),
            "CORS_ORIGINS" => Some(" https://a.example , *, ".to_string()),
            "SITECACHE_DATA_DIR" => Some("/srv/site".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.cors_origins, vec!["https://a.example", "*"]);
        assert!(config.allows_any_origin());
        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/site")));
    }

    #[test]
    fn test_invalid_port() {
        assert!(ServerConfig::from_lookup(|key| (key == "PORT").then(|| "http".to_string())).is_err());
    }
}
