//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_URL: &str = "http://localhost:8080";
const DEFAULT_ALERT_PATH: &str = "/";

/// CLI configuration, read from `~/.config/prctl/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Responder base URL
    pub url: Option<String>,
    /// Route the responder accepts alerts on
    pub alert_path: Option<String>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Responder URL: flag or environment first, then file, then default
    pub fn resolve_url(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.url.clone())
            .unwrap_or_else(|| DEFAULT_URL.to_string())
    }

    pub fn resolve_alert_path(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.alert_path.clone())
            .unwrap_or_else(|| DEFAULT_ALERT_PATH.to_string())
    }

    fn config_path() -> Option<PathBuf> {
        let home = dirs_next::home_dir()?;
        Some(home.join(".config").join("prctl").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();

        assert_eq!(config.resolve_url(None), "http://localhost:8080");
        assert_eq!(config.resolve_alert_path(None), "/");
    }

    #[test]
    fn test_file_values_and_flag_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"url":"http://pod-responder.falco:8080","alert_path":"/falco"}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.resolve_url(None), "http://pod-responder.falco:8080");
        assert_eq!(config.resolve_alert_path(None), "/falco");
        assert_eq!(
            config.resolve_url(Some("http://127.0.0.1:9000".to_string())),
            "http://127.0.0.1:9000"
        );
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{url:").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
