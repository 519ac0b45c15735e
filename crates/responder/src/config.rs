//! Responder configuration

use anyhow::{bail, Result};
use responder_lib::credentials::{CredentialSource, DEFAULT_SECRET_ENV};
use responder_lib::secrets::{SecretManagerSettings, DEFAULT_ENDPOINT, DEFAULT_METADATA_TOKEN_URL};
use responder_lib::{ClusterSettings, ResponderSettings};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Responder configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ResponderConfig {
    /// API server port for alerts, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Route the Falco webhook posts to
    #[serde(default = "default_alert_path")]
    pub alert_path: String,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub secret_manager: SecretManagerConfig,

    #[serde(default)]
    pub cluster: ClusterConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSourceKind {
    #[default]
    Local,
    SecretManager,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub source: CredentialSourceKind,

    /// Explicit kubeconfig path for the local source
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    /// Environment variable holding the Secret Manager resource name
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecretManagerConfig {
    #[serde(default = "default_secret_manager_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_metadata_token_url")]
    pub metadata_token_url: String,

    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_secret_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    #[serde(default = "default_verify_access")]
    pub verify_access: bool,

    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,

    #[serde(default)]
    pub read_timeout_secs: Option<u64>,
}

fn default_api_port() -> u16 {
    8080
}

fn default_alert_path() -> String {
    "/".to_string()
}

fn default_secret_env() -> String {
    DEFAULT_SECRET_ENV.to_string()
}

fn default_secret_manager_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_metadata_token_url() -> String {
    DEFAULT_METADATA_TOKEN_URL.to_string()
}

fn default_secret_timeout() -> u64 {
    30
}

fn default_verify_access() -> bool {
    true
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            source: CredentialSourceKind::default(),
            kubeconfig: None,
            secret_env: default_secret_env(),
        }
    }
}

impl Default for SecretManagerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_secret_manager_endpoint(),
            metadata_token_url: default_metadata_token_url(),
            access_token: None,
            timeout_secs: default_secret_timeout(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            verify_access: default_verify_access(),
            connect_timeout_secs: None,
            read_timeout_secs: None,
        }
    }
}

impl ResponderConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// `RESPONDER_CONFIG` names a config file; `RESPONDER_*` variables
    /// override it, with `__` separating nested keys
    /// (`RESPONDER_CREDENTIALS__SOURCE=secret_manager`).
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Ok(path) = std::env::var("RESPONDER_CONFIG") {
            builder = builder.add_source(config::File::with_name(&path));
        }

        let builder = builder.add_source(
            config::Environment::with_prefix("RESPONDER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Self::from_builder(builder)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.alert_path.starts_with('/') {
            bail!("alert_path must start with '/', got {:?}", self.alert_path);
        }
        if matches!(self.alert_path.as_str(), "/healthz" | "/readyz" | "/metrics") {
            bail!("alert_path {} collides with a built-in route", self.alert_path);
        }
        Ok(())
    }

    /// Settings handed to `responder_lib::initialize`
    pub fn responder_settings(&self) -> ResponderSettings {
        let credentials = match self.credentials.source {
            CredentialSourceKind::Local => CredentialSource::Local {
                kubeconfig: self.credentials.kubeconfig.clone(),
            },
            CredentialSourceKind::SecretManager => CredentialSource::SecretManager {
                resource_env: self.credentials.secret_env.clone(),
                settings: SecretManagerSettings {
                    endpoint: self.secret_manager.endpoint.clone(),
                    metadata_token_url: self.secret_manager.metadata_token_url.clone(),
                    access_token: self
                        .secret_manager
                        .access_token
                        .clone()
                        .or_else(|| std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN").ok()),
                    timeout: Duration::from_secs(self.secret_manager.timeout_secs),
                },
            },
        };

        ResponderSettings {
            credentials,
            cluster: ClusterSettings {
                verify_access: self.cluster.verify_access,
                connect_timeout: self.cluster.connect_timeout_secs.map(Duration::from_secs),
                read_timeout: self.cluster.read_timeout_secs.map(Duration::from_secs),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn from_toml(toml: &str) -> Result<ResponderConfig> {
        ResponderConfig::from_builder(
            config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
        )
    }

    #[test]
    fn test_defaults() {
        let config = from_toml("").unwrap();

        assert_eq!(config.api_port, 8080);
        assert_eq!(config.alert_path, "/");
        assert_eq!(config.credentials.source, CredentialSourceKind::Local);
        assert_eq!(config.credentials.secret_env, "KUBECONFIG_SECRET");
        assert!(config.cluster.verify_access);

        let settings = config.responder_settings();
        assert_eq!(settings.credentials.kind(), "local");
        assert!(settings.cluster.read_timeout.is_none());
    }

    #[test]
    fn test_secret_manager_source() {
        let config = from_toml(
            r#"
            api_port = 9000
            alert_path = "/falco"

            [credentials]
            source = "secret_manager"
            secret_env = "CLUSTER_KUBECONFIG_SECRET"

            [secret_manager]
            access_token = "ya29.token"
            timeout_secs = 5

            [cluster]
            verify_access = false
            read_timeout_secs = 10
            "#,
        )
        .unwrap();

        let settings = config.responder_settings();
        match settings.credentials {
            CredentialSource::SecretManager {
                resource_env,
                settings,
            } => {
                assert_eq!(resource_env, "CLUSTER_KUBECONFIG_SECRET");
                assert_eq!(settings.access_token.as_deref(), Some("ya29.token"));
                assert_eq!(settings.timeout, Duration::from_secs(5));
                assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
            }
            other => panic!("expected secret manager source, got {other:?}"),
        }
        assert!(!settings.cluster.verify_access);
        assert_eq!(settings.cluster.read_timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_unknown_source_is_an_error() {
        let result = from_toml(
            r#"
            [credentials]
            source = "vault"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_relative_alert_path_rejected() {
        assert!(from_toml(r#"alert_path = "falco""#).is_err());
        assert!(from_toml(r#"alert_path = "/metrics""#).is_err());
    }
}
