//! Core data models for the responder

use serde::{Deserialize, Serialize};

use crate::error::PayloadError;

/// Falco alert as delivered by the webhook output
///
/// Every field is optional: only the namespace and pod name are required,
/// and that is checked by [`Alert::target`] rather than at decode time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_fields: Option<OutputFields>,
}

/// Structured fields attached to a Falco event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputFields {
    #[serde(rename = "container.id", skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    /// Untyped in Falco output; may be a string or null
    #[serde(
        rename = "container.image.repository",
        skip_serializing_if = "Option::is_none"
    )]
    pub container_image_repository: Option<serde_json::Value>,
    #[serde(rename = "container.image.tag", skip_serializing_if = "Option::is_none")]
    pub container_image_tag: Option<serde_json::Value>,
    /// Event time in nanoseconds since the epoch
    #[serde(rename = "evt.time", skip_serializing_if = "Option::is_none")]
    pub evt_time: Option<i64>,
    #[serde(rename = "fd.name", skip_serializing_if = "Option::is_none")]
    pub fd_name: Option<String>,
    #[serde(rename = "k8s.ns.name", skip_serializing_if = "Option::is_none")]
    pub k8s_ns_name: Option<String>,
    #[serde(rename = "k8s.pod.name", skip_serializing_if = "Option::is_none")]
    pub k8s_pod_name: Option<String>,
    #[serde(rename = "proc.cmdline", skip_serializing_if = "Option::is_none")]
    pub proc_cmdline: Option<String>,
}

impl Alert {
    /// Decode an alert from a raw request body
    pub fn from_slice(raw: &[u8]) -> Result<Self, PayloadError> {
        serde_json::from_slice(raw).map_err(|e| PayloadError::Malformed(e.to_string()))
    }

    /// Extract the pod to remediate
    ///
    /// Fails when the namespace or pod name is absent, null, or blank.
    pub fn target(&self) -> Result<RemediationTarget, PayloadError> {
        let fields = self.output_fields.as_ref();

        let namespace = fields
            .and_then(|f| f.k8s_ns_name.as_deref())
            .filter(|ns| !ns.trim().is_empty())
            .ok_or(PayloadError::MissingNamespace)?;

        let pod_name = fields
            .and_then(|f| f.k8s_pod_name.as_deref())
            .filter(|name| !name.trim().is_empty())
            .ok_or(PayloadError::MissingPodName)?;

        Ok(RemediationTarget::new(namespace, pod_name))
    }

    pub fn container_id(&self) -> Option<&str> {
        self.output_fields.as_ref()?.container_id.as_deref()
    }

    pub fn proc_cmdline(&self) -> Option<&str> {
        self.output_fields.as_ref()?.proc_cmdline.as_deref()
    }
}

/// The pod a single alert asks us to delete
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemediationTarget {
    pub namespace: String,
    pub pod_name: String,
}

impl RemediationTarget {
    pub fn new(namespace: impl Into<String>, pod_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            pod_name: pod_name.into(),
        }
    }
}

impl std::fmt::Display for RemediationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.pod_name)
    }
}
