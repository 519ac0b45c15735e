//! Responder library for Falco-driven pod remediation
//!
//! This crate provides the core functionality for:
//! - Decoding and validating Falco alerts
//! - Resolving cluster credentials (local or Secret Manager)
//! - Deleting the pod an alert names
//! - The HTTP API, health checks and observability

pub mod api;
pub mod credentials;
pub mod error;
pub mod health;
pub mod ingest;
pub mod models;
pub mod observability;
pub mod remediation;
pub mod secrets;
pub mod state;

pub use error::{PayloadError, RemediationError, StartupError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use ingest::{AlertIngestor, RemediationOutcome};
pub use models::*;
pub use observability::{ResponderMetrics, StructuredLogger};
pub use remediation::{PodTerminator, RemediationClient};
pub use state::{initialize, ClusterSettings, ProcessState, ResponderSettings};
