//! Error types for the responder.
//!
//! Three families, by lifetime:
//! - [`StartupError`]: fatal, returned from [`crate::state::initialize`]
//! - [`PayloadError`]: per request, the alert body was unusable
//! - [`RemediationError`]: per request, the cluster refused or failed the delete

use thiserror::Error;

/// Errors that prevent the responder from obtaining a working cluster client.
#[derive(Debug, Error)]
pub enum StartupError {
    /// No credential source could be located
    #[error("missing configuration source: {0}")]
    MissingConfigSource(String),

    /// The secret store refused access to the credential
    #[error("access to secret {0} denied")]
    SecretAccessDenied(String),

    /// The named secret or version does not exist
    #[error("secret {0} not found")]
    SecretNotFound(String),

    /// The secret store could not be reached or answered unexpectedly
    #[error("secret manager unavailable: {0}")]
    SecretServiceUnavailable(String),

    /// A credential was found but could not be decoded as a kubeconfig
    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    /// The Kubernetes client could not be built from the credential
    #[error("failed to build Kubernetes client: {0}")]
    ClientBuild(String),

    /// Startup verification against the API server failed
    #[error("cluster unreachable: {0}")]
    ClusterUnreachable(String),
}

/// Errors in an inbound alert body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// Body is not a decodable alert document
    #[error("cannot parse body: {0}")]
    Malformed(String),

    #[error("missing k8s.ns.name")]
    MissingNamespace,

    #[error("missing k8s.pod.name")]
    MissingPodName,
}

/// Classified failure of a pod deletion.
///
/// The `Display` text is what callers see as the failure reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemediationError {
    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    /// Connectivity or server-side failure
    #[error("{0}")]
    Transient(String),

    #[error("{0}")]
    Unknown(String),
}

impl RemediationError {
    /// Metric label for this failure class
    pub fn label(&self) -> &'static str {
        match self {
            RemediationError::NotFound => "not_found",
            RemediationError::Forbidden => "forbidden",
            RemediationError::Transient(_) => "transient",
            RemediationError::Unknown(_) => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remediation_error_reasons() {
        assert_eq!(RemediationError::NotFound.to_string(), "not found");
        assert_eq!(RemediationError::Forbidden.to_string(), "forbidden");
        assert_eq!(
            RemediationError::Transient("connection refused".into()).to_string(),
            "connection refused"
        );
        assert_eq!(RemediationError::Unknown("conflict".into()).label(), "unknown");
    }

    #[test]
    fn test_payload_error_messages() {
        assert_eq!(PayloadError::MissingNamespace.to_string(), "missing k8s.ns.name");
        assert_eq!(PayloadError::MissingPodName.to_string(), "missing k8s.pod.name");
    }
}
