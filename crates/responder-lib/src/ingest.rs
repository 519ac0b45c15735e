//! Alert ingestion: parse, validate, dispatch, report
//!
//! Each call is independent. There is no queue, no retry and no
//! deduplication; two alerts for the same pod race at the API server.

use std::sync::Arc;
use std::time::Instant;

use crate::error::{PayloadError, RemediationError};
use crate::health::{components, HealthRegistry};
use crate::models::{Alert, RemediationTarget};
use crate::observability::{
    ResponderMetrics, StructuredLogger, OUTCOME_DELETED, OUTCOME_REJECTED,
};
use crate::remediation::PodTerminator;

/// Result of handling one alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationOutcome {
    /// The API server accepted the deletion
    Remediated(RemediationTarget),
    /// The payload was unusable; nothing was sent to the cluster
    Rejected(PayloadError),
    /// The deletion was attempted and failed
    Failed {
        target: RemediationTarget,
        error: RemediationError,
    },
}

impl RemediationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RemediationOutcome::Remediated(_))
    }

    /// Human-readable result text returned to the caller
    pub fn message(&self) -> String {
        match self {
            RemediationOutcome::Remediated(target) => format!("deleted pod {target}"),
            RemediationOutcome::Rejected(error) => error.to_string(),
            RemediationOutcome::Failed { target, error } => {
                format!("cannot delete pod {target}: {error}")
            }
        }
    }
}

/// Turns alert payloads into pod deletions
#[derive(Clone)]
pub struct AlertIngestor {
    terminator: Arc<dyn PodTerminator>,
    health: HealthRegistry,
    metrics: ResponderMetrics,
    logger: StructuredLogger,
}

impl AlertIngestor {
    pub fn new(
        terminator: Arc<dyn PodTerminator>,
        health: HealthRegistry,
        metrics: ResponderMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            terminator,
            health,
            metrics,
            logger,
        }
    }

    /// Handle one raw alert body
    pub async fn ingest(&self, raw_payload: &[u8]) -> RemediationOutcome {
        self.metrics.inc_alerts_received();

        let (alert, target) = match Alert::from_slice(raw_payload)
            .and_then(|alert| alert.target().map(|target| (alert, target)))
        {
            Ok(parsed) => parsed,
            Err(error) => {
                self.metrics.inc_outcome(OUTCOME_REJECTED);
                self.logger.log_rejection(&error);
                return RemediationOutcome::Rejected(error);
            }
        };

        let started = Instant::now();
        let result = self.terminator.terminate(&target).await;
        let elapsed = started.elapsed();
        self.metrics.observe_remediation_latency(elapsed.as_secs_f64());

        match result {
            Ok(()) => {
                self.metrics.inc_outcome(OUTCOME_DELETED);
                self.health.set_healthy(components::CLUSTER_API).await;
                self.health.set_healthy(components::CREDENTIALS).await;
                self.logger.log_remediation(&alert, &target, elapsed.as_millis());
                RemediationOutcome::Remediated(target)
            }
            Err(error) => {
                self.metrics.inc_outcome(error.label());
                match &error {
                    RemediationError::Transient(cause) => {
                        self.health
                            .set_degraded(components::CLUSTER_API, cause.clone())
                            .await;
                    }
                    RemediationError::Forbidden => {
                        self.health
                            .set_degraded(
                                components::CREDENTIALS,
                                format!("credential rejected deleting pod {target}"),
                            )
                            .await;
                    }
                    RemediationError::NotFound | RemediationError::Unknown(_) => {}
                }
                self.logger.log_remediation_failure(&alert, &target, &error);
                RemediationOutcome::Failed { target, error }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ComponentStatus;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory cluster: deleting a pod removes it, deleting it again is NotFound
    #[derive(Default)]
    struct FakeCluster {
        pods: Mutex<HashSet<RemediationTarget>>,
        calls: AtomicUsize,
        failure: Option<RemediationError>,
    }

    impl FakeCluster {
        fn with_pods(pods: &[(&str, &str)]) -> Self {
            Self {
                pods: Mutex::new(
                    pods.iter()
                        .map(|(ns, name)| RemediationTarget::new(*ns, *name))
                        .collect(),
                ),
                ..Default::default()
            }
        }

        fn failing(error: RemediationError) -> Self {
            Self {
                failure: Some(error),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn contains(&self, namespace: &str, name: &str) -> bool {
            self.pods
                .lock()
                .unwrap()
                .contains(&RemediationTarget::new(namespace, name))
        }
    }

    #[async_trait]
    impl PodTerminator for FakeCluster {
        async fn terminate(&self, target: &RemediationTarget) -> Result<(), RemediationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if let Some(error) = &self.failure {
                return Err(error.clone());
            }
            if self.pods.lock().unwrap().remove(target) {
                Ok(())
            } else {
                Err(RemediationError::NotFound)
            }
        }
    }

    fn ingestor(cluster: Arc<FakeCluster>) -> (AlertIngestor, HealthRegistry) {
        let health = HealthRegistry::new();
        let ingestor = AlertIngestor::new(
            cluster,
            health.clone(),
            ResponderMetrics::new(),
            StructuredLogger::new("test"),
        );
        (ingestor, health)
    }

    fn payload(namespace: &str, pod: &str) -> Vec<u8> {
        serde_json::json!({
            "output_fields": { "k8s.ns.name": namespace, "k8s.pod.name": pod }
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn test_existing_pod_is_deleted() {
        let cluster = Arc::new(FakeCluster::with_pods(&[("prod", "web-7")]));
        let (ingestor, _) = ingestor(cluster.clone());

        let outcome = ingestor
            .ingest(br#"{"output_fields":{"k8s.ns.name":"prod","k8s.pod.name":"web-7"}}"#)
            .await;

        assert_eq!(
            outcome,
            RemediationOutcome::Remediated(RemediationTarget::new("prod", "web-7"))
        );
        assert_eq!(outcome.message(), "deleted pod prod/web-7");
        assert!(!cluster.contains("prod", "web-7"));
    }

    #[tokio::test]
    async fn test_empty_namespace_never_reaches_cluster() {
        let cluster = Arc::new(FakeCluster::with_pods(&[("prod", "web-7")]));
        let (ingestor, _) = ingestor(cluster.clone());

        let outcome = ingestor
            .ingest(br#"{"output_fields":{"k8s.ns.name":"","k8s.pod.name":"web-7"}}"#)
            .await;

        assert_eq!(
            outcome,
            RemediationOutcome::Rejected(PayloadError::MissingNamespace)
        );
        assert_eq!(cluster.calls(), 0);
        assert!(cluster.contains("prod", "web-7"));
    }

    #[tokio::test]
    async fn test_empty_pod_name_never_reaches_cluster() {
        let cluster = Arc::new(FakeCluster::with_pods(&[("prod", "web-7")]));
        let (ingestor, _) = ingestor(cluster.clone());

        let outcome = ingestor.ingest(&payload("prod", "")).await;

        assert_eq!(outcome, RemediationOutcome::Rejected(PayloadError::MissingPodName));
        assert_eq!(cluster.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_never_reaches_cluster() {
        let cluster = Arc::new(FakeCluster::default());
        let (ingestor, _) = ingestor(cluster.clone());

        let outcome = ingestor.ingest(br#"{"output_fields":"#).await;

        assert!(matches!(
            outcome,
            RemediationOutcome::Rejected(PayloadError::Malformed(_))
        ));
        assert_eq!(cluster.calls(), 0);
    }

    #[tokio::test]
    async fn test_second_alert_for_deleted_pod_is_not_found() {
        let cluster = Arc::new(FakeCluster::with_pods(&[("prod", "web-7")]));
        let (ingestor, _) = ingestor(cluster.clone());

        assert!(ingestor.ingest(&payload("prod", "web-7")).await.is_success());
        let second = ingestor.ingest(&payload("prod", "web-7")).await;

        assert_eq!(
            second,
            RemediationOutcome::Failed {
                target: RemediationTarget::new("prod", "web-7"),
                error: RemediationError::NotFound,
            }
        );
        assert_eq!(second.message(), "cannot delete pod prod/web-7: not found");
    }

    #[tokio::test]
    async fn test_concurrent_distinct_targets_both_succeed() {
        let cluster = Arc::new(FakeCluster::with_pods(&[("prod", "web-7"), ("dev", "api-1")]));
        let (ingestor, _) = ingestor(cluster.clone());

        let first = payload("prod", "web-7");
        let second = payload("dev", "api-1");
        let (a, b) = tokio::join!(ingestor.ingest(&first), ingestor.ingest(&second));

        assert!(a.is_success());
        assert!(b.is_success());
        assert!(!cluster.contains("prod", "web-7"));
        assert!(!cluster.contains("dev", "api-1"));
    }

    #[tokio::test]
    async fn test_concurrent_same_target_exactly_one_succeeds() {
        let cluster = Arc::new(FakeCluster::with_pods(&[("prod", "web-7")]));
        let (ingestor, _) = ingestor(cluster.clone());

        let body = payload("prod", "web-7");
        let tasks = (0..2).map(|_| {
            let ingestor = ingestor.clone();
            let body = body.clone();
            tokio::spawn(async move { ingestor.ingest(&body).await })
        });
        let mut outcomes = Vec::new();
        for task in tasks.collect::<Vec<_>>() {
            outcomes.push(task.await.unwrap());
        }

        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 1);
        assert!(outcomes.iter().any(|o| matches!(
            o,
            RemediationOutcome::Failed {
                error: RemediationError::NotFound,
                ..
            }
        )));
        assert_eq!(cluster.calls(), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_degrades_cluster_api() {
        let cluster = Arc::new(FakeCluster::failing(RemediationError::Transient(
            "connection refused".to_string(),
        )));
        let (ingestor, health) = ingestor(cluster);
        health.register(components::CLUSTER_API).await;

        let outcome = ingestor.ingest(&payload("prod", "web-7")).await;

        assert_eq!(outcome.message(), "cannot delete pod prod/web-7: connection refused");
        assert_eq!(
            health.status_of(components::CLUSTER_API).await,
            Some(ComponentStatus::Degraded)
        );
    }

    #[tokio::test]
    async fn test_forbidden_is_reported_as_failure() {
        let cluster = Arc::new(FakeCluster::failing(RemediationError::Forbidden));
        let (ingestor, health) = ingestor(cluster);
        health.register(components::CREDENTIALS).await;
        health.register(components::CLUSTER_API).await;

        let outcome = ingestor.ingest(&payload("kube-system", "coredns-0")).await;

        assert_eq!(
            outcome.message(),
            "cannot delete pod kube-system/coredns-0: forbidden"
        );
        assert_eq!(
            health.status_of(components::CLUSTER_API).await,
            Some(ComponentStatus::Healthy)
        );
        assert_eq!(
            health.status_of(components::CREDENTIALS).await,
            Some(ComponentStatus::Degraded)
        );
    }

    #[tokio::test]
    async fn test_successful_delete_clears_credential_warning() {
        let cluster = Arc::new(FakeCluster::with_pods(&[("prod", "web-7")]));
        let (ingestor, health) = ingestor(cluster);
        health.register(components::CREDENTIALS).await;
        health
            .set_degraded(components::CREDENTIALS, "credential rejected")
            .await;

        let outcome = ingestor.ingest(&payload("prod", "web-7")).await;

        assert!(outcome.is_success());
        assert_eq!(
            health.status_of(components::CREDENTIALS).await,
            Some(ComponentStatus::Healthy)
        );
    }
}
