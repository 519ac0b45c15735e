//! HTTP API: alert ingestion, health checks and Prometheus metrics

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

use crate::health::ComponentStatus;
use crate::ingest::RemediationOutcome;
use crate::state::ProcessState;

impl IntoResponse for RemediationOutcome {
    fn into_response(self) -> Response {
        let status = match &self {
            RemediationOutcome::Remediated(_) => StatusCode::OK,
            RemediationOutcome::Rejected(_) => StatusCode::BAD_REQUEST,
            RemediationOutcome::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.message()).into_response()
    }
}

/// Falco webhook target
///
/// Ingestion runs on its own task so a delete that has been issued completes,
/// and is counted and logged, even if the caller disconnects.
async fn receive_alert(State(state): State<Arc<ProcessState>>, body: Bytes) -> Response {
    let ingestion = tokio::spawn(async move { state.ingestor.ingest(&body).await });

    match ingestion.await {
        Ok(outcome) => outcome.into_response(),
        Err(e) => {
            error!(error = %e, "Alert ingestion task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "alert ingestion failed").into_response()
        }
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<ProcessState>>) -> impl IntoResponse {
    let health = state.health.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still able to delete pods
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<ProcessState>>) -> impl IntoResponse {
    let readiness = state.health.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router with the alert route mounted at `alert_path`
pub fn create_router(state: Arc<ProcessState>, alert_path: &str) -> Router {
    Router::new()
        .route(alert_path, post(receive_alert))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve(
    port: u16,
    alert_path: &str,
    state: Arc<ProcessState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = create_router(state, alert_path);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, alert_path = %alert_path, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
