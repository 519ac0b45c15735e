//! Process state and the explicit startup phase
//!
//! [`initialize`] resolves credentials, builds the one Kubernetes client the
//! process will use, and wires it into an [`AlertIngestor`]. Failure is a
//! [`StartupError`]; the caller decides whether to exit.

use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::credentials::{self, CredentialSource};
use crate::error::StartupError;
use crate::health::{components, HealthRegistry};
use crate::ingest::AlertIngestor;
use crate::observability::{ResponderMetrics, StructuredLogger};
use crate::remediation::{PodTerminator, RemediationClient};

/// Kubernetes client settings applied before the client is built
#[derive(Debug, Clone)]
pub struct ClusterSettings {
    /// Probe the API server once during startup
    pub verify_access: bool,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            verify_access: true,
            connect_timeout: None,
            read_timeout: None,
        }
    }
}

/// Everything `initialize` needs
#[derive(Debug, Clone)]
pub struct ResponderSettings {
    pub credentials: CredentialSource,
    pub cluster: ClusterSettings,
}

/// Long-lived state shared by every request handler
pub struct ProcessState {
    pub ingestor: AlertIngestor,
    pub health: HealthRegistry,
    pub metrics: ResponderMetrics,
}

impl ProcessState {
    /// Wire state around an already constructed terminator
    pub async fn with_terminator(
        terminator: Arc<dyn PodTerminator>,
        logger: StructuredLogger,
    ) -> Self {
        let health = HealthRegistry::new();
        health.register(components::CREDENTIALS).await;
        health.register(components::CLUSTER_API).await;

        let metrics = ResponderMetrics::new();
        let ingestor = AlertIngestor::new(terminator, health.clone(), metrics.clone(), logger);

        health.set_ready(true).await;

        Self {
            ingestor,
            health,
            metrics,
        }
    }
}

/// Resolve credentials and build the process state
pub async fn initialize(
    settings: &ResponderSettings,
    logger: StructuredLogger,
) -> Result<ProcessState, StartupError> {
    let mut credential = credentials::resolve(&settings.credentials).await?;
    logger.log_credential_resolved(&credential.origin.to_string());

    if let Some(timeout) = settings.cluster.connect_timeout {
        credential.config.connect_timeout = Some(timeout);
    }
    if let Some(timeout) = settings.cluster.read_timeout {
        credential.config.read_timeout = Some(timeout);
    }

    let client =
        Client::try_from(credential.config).map_err(|e| StartupError::ClientBuild(e.to_string()))?;

    if settings.cluster.verify_access {
        let version = client
            .apiserver_version()
            .await
            .map_err(|e| StartupError::ClusterUnreachable(e.to_string()))?;
        info!(
            git_version = %version.git_version,
            platform = %version.platform,
            "Verified cluster access"
        );
    }

    let state =
        ProcessState::with_terminator(Arc::new(RemediationClient::new(client)), logger).await;
    state.metrics.set_build_info(
        env!("CARGO_PKG_VERSION"),
        settings.credentials.kind(),
    );

    Ok(state)
}
