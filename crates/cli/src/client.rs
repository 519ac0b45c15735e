//! HTTP client for the Pod Responder API

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use responder_lib::{Alert, HealthResponse, ReadinessResponse};
use serde::de::DeserializeOwned;
use url::Url;

/// Responder reply to a posted alert
#[derive(Debug, Clone)]
pub struct AlertReply {
    pub status: StatusCode,
    pub message: String,
}

/// API client for the responder
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid responder URL")?;

        Ok(Self { client, base_url })
    }

    /// Post an alert and return the responder's verdict, whatever the status
    pub async fn post_alert(&self, path: &str, alert: &Alert) -> Result<AlertReply> {
        let url = self.base_url.join(path).context("Invalid alert path")?;

        let response = self
            .client
            .post(url)
            .json(alert)
            .send()
            .await
            .context("Failed to send alert")?;

        let status = response.status();
        let message = response.text().await.unwrap_or_default();

        Ok(AlertReply { status, message })
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get_probe("healthz").await
    }

    pub async fn readiness(&self) -> Result<ReadinessResponse> {
        self.get_probe("readyz").await
    }

    /// GET a probe endpoint; 503 still carries a JSON body
    async fn get_probe<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::SERVICE_UNAVAILABLE {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }
}
