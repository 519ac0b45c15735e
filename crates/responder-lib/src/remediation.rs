//! Pod deletion against the Kubernetes API
//!
//! One delete per call, default delete options, no retry and no wait for
//! the pod to actually terminate.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams};
use kube::Client;
use tracing::debug;

use crate::error::RemediationError;
use crate::models::RemediationTarget;

/// Something that can delete a pod
#[async_trait]
pub trait PodTerminator: Send + Sync {
    async fn terminate(&self, target: &RemediationTarget) -> Result<(), RemediationError>;
}

/// Deletes pods through a long-lived Kubernetes client
#[derive(Clone)]
pub struct RemediationClient {
    client: Client,
}

impl RemediationClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Delete `name` in `namespace`
    pub async fn delete(&self, namespace: &str, name: &str) -> Result<(), RemediationError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);

        pods.delete(name, &DeleteParams::default())
            .await
            .map_err(classify)?;

        debug!(namespace = %namespace, pod = %name, "Pod deletion accepted");
        Ok(())
    }
}

#[async_trait]
impl PodTerminator for RemediationClient {
    async fn terminate(&self, target: &RemediationTarget) -> Result<(), RemediationError> {
        self.delete(&target.namespace, &target.pod_name).await
    }
}

/// Map a Kubernetes client error onto the remediation taxonomy
pub fn classify(err: kube::Error) -> RemediationError {
    match err {
        kube::Error::Api(response) => match response.code {
            404 => RemediationError::NotFound,
            401 | 403 => RemediationError::Forbidden,
            429 | 500..=599 => RemediationError::Transient(format!(
                "{} ({}): {}",
                response.reason, response.code, response.message
            )),
            _ => RemediationError::Unknown(format!(
                "{} ({}): {}",
                response.reason, response.code, response.message
            )),
        },
        kube::Error::Auth(e) => {
            debug!(error = %e, "Client-side authentication failed");
            RemediationError::Forbidden
        }
        err @ (kube::Error::HyperError(_) | kube::Error::Service(_)) => {
            RemediationError::Transient(err.to_string())
        }
        other => RemediationError::Unknown(other.to_string()),
    }
}
