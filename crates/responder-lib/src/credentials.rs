//! Cluster credential resolution
//!
//! Exactly one [`CredentialSource`] is configured per deployment:
//! - `Local`: explicit kubeconfig, the `KUBECONFIG` chain, `~/.kube/config`,
//!   then in-cluster service account
//! - `SecretManager`: a kubeconfig stored in Google Secret Manager, named by
//!   an environment variable
//!
//! The credential is resolved once at startup and never refreshed.

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Config;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::StartupError;
use crate::secrets::{self, SecretError, SecretManagerSettings};

/// Default environment variable holding the secret resource name
pub const DEFAULT_SECRET_ENV: &str = "KUBECONFIG_SECRET";

/// Where cluster credentials come from
#[derive(Debug, Clone)]
pub enum CredentialSource {
    Local {
        /// Explicit kubeconfig path; overrides the `KUBECONFIG` chain
        kubeconfig: Option<PathBuf>,
    },
    SecretManager {
        /// Name of the environment variable holding the secret resource name
        resource_env: String,
        settings: SecretManagerSettings,
    },
}

impl CredentialSource {
    pub fn kind(&self) -> &'static str {
        match self {
            CredentialSource::Local { .. } => "local",
            CredentialSource::SecretManager { .. } => "secret_manager",
        }
    }
}

/// Where a resolved credential was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialOrigin {
    Kubeconfig(PathBuf),
    KubeconfigEnv,
    InCluster,
    SecretManager(String),
}

impl std::fmt::Display for CredentialOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialOrigin::Kubeconfig(path) => write!(f, "kubeconfig:{}", path.display()),
            CredentialOrigin::KubeconfigEnv => write!(f, "kubeconfig:$KUBECONFIG"),
            CredentialOrigin::InCluster => write!(f, "in-cluster"),
            CredentialOrigin::SecretManager(name) => write!(f, "secret-manager:{name}"),
        }
    }
}

/// Cluster access configuration resolved at startup
#[derive(Debug, Clone)]
pub struct Credential {
    pub config: Config,
    pub origin: CredentialOrigin,
}

/// Resolve credentials from the configured source
pub async fn resolve(source: &CredentialSource) -> Result<Credential, StartupError> {
    let credential = match source {
        CredentialSource::Local { kubeconfig } => resolve_local(kubeconfig.as_deref()).await?,
        CredentialSource::SecretManager {
            resource_env,
            settings,
        } => {
            let resource = std::env::var(resource_env)
                .ok()
                .filter(|name| !name.trim().is_empty())
                .ok_or_else(|| {
                    StartupError::MissingConfigSource(format!(
                        "environment variable {resource_env} is not set"
                    ))
                })?;
            resolve_secret(&resource, settings).await?
        }
    };

    info!(
        origin = %credential.origin,
        cluster_url = %credential.config.cluster_url,
        "Resolved cluster credentials"
    );
    Ok(credential)
}

/// Strategy A: locally available configuration
pub async fn resolve_local(explicit: Option<&Path>) -> Result<Credential, StartupError> {
    if let Some(path) = explicit {
        let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
            StartupError::MalformedCredential(format!("{}: {e}", path.display()))
        })?;
        return from_kubeconfig(kubeconfig, CredentialOrigin::Kubeconfig(path.to_path_buf())).await;
    }

    let from_env = match std::env::var_os("KUBECONFIG") {
        Some(value) => kubeconfig_from_paths(&value)?,
        None => None,
    };
    if let Some(kubeconfig) = from_env {
        return from_kubeconfig(kubeconfig, CredentialOrigin::KubeconfigEnv).await;
    }

    if let Some(path) = default_kubeconfig_path().filter(|p| p.exists()) {
        let kubeconfig = Kubeconfig::read_from(&path).map_err(|e| {
            StartupError::MalformedCredential(format!("{}: {e}", path.display()))
        })?;
        return from_kubeconfig(kubeconfig, CredentialOrigin::Kubeconfig(path)).await;
    }

    debug!("No kubeconfig found, trying in-cluster service account");
    let config = Config::incluster().map_err(|e| {
        StartupError::MissingConfigSource(format!(
            "no kubeconfig found and not running in a cluster: {e}"
        ))
    })?;

    Ok(Credential {
        config,
        origin: CredentialOrigin::InCluster,
    })
}

/// Strategy B: kubeconfig stored in Secret Manager
pub async fn resolve_secret(
    resource: &str,
    settings: &SecretManagerSettings,
) -> Result<Credential, StartupError> {
    let bytes = secrets::fetch_secret(settings, resource)
        .await
        .map_err(|e| match e {
            SecretError::NotFound(name) => StartupError::SecretNotFound(name),
            SecretError::PermissionDenied(reason) => StartupError::SecretAccessDenied(reason),
            SecretError::Unavailable(reason) => StartupError::SecretServiceUnavailable(reason),
            SecretError::Malformed(reason) => StartupError::MalformedCredential(reason),
        })?;

    let yaml = String::from_utf8(bytes)
        .map_err(|e| StartupError::MalformedCredential(format!("secret is not UTF-8: {e}")))?;
    let kubeconfig = Kubeconfig::from_yaml(&yaml)
        .map_err(|e| StartupError::MalformedCredential(e.to_string()))?;

    from_kubeconfig(
        kubeconfig,
        CredentialOrigin::SecretManager(secrets::version_name(resource)),
    )
    .await
}

async fn from_kubeconfig(
    kubeconfig: Kubeconfig,
    origin: CredentialOrigin,
) -> Result<Credential, StartupError> {
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| StartupError::MalformedCredential(e.to_string()))?;

    Ok(Credential { config, origin })
}

/// Merge the existing files of a `KUBECONFIG`-style path list
///
/// Entries that do not exist are skipped; `None` when none exist.
fn kubeconfig_from_paths(value: &OsStr) -> Result<Option<Kubeconfig>, StartupError> {
    let mut merged: Option<Kubeconfig> = None;

    for path in std::env::split_paths(value) {
        if path.as_os_str().is_empty() || !path.exists() {
            debug!(path = %path.display(), "Skipping missing kubeconfig");
            continue;
        }
        let next = Kubeconfig::read_from(&path).map_err(|e| {
            StartupError::MalformedCredential(format!("{}: {e}", path.display()))
        })?;
        merged = Some(match merged {
            Some(current) => current
                .merge(next)
                .map_err(|e| StartupError::MalformedCredential(format!("$KUBECONFIG: {e}")))?,
            None => next,
        });
    }

    Ok(merged)
}

fn default_kubeconfig_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".kube").join("config"))
}
