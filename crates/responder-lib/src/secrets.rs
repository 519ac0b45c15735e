//! Google Secret Manager access for the remote credential strategy
//!
//! A [`SecretSession`] holds the HTTP client and bearer token for one fetch.
//! It is released by [`SecretSession::close`] on every normal path and by
//! `Drop` when a caller unwinds, so no session outlives the fetch.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Default REST endpoint for Secret Manager
pub const DEFAULT_ENDPOINT: &str = "https://secretmanager.googleapis.com";

/// GCE metadata server token endpoint for the default service account
pub const DEFAULT_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Connection settings for Secret Manager
#[derive(Debug, Clone)]
pub struct SecretManagerSettings {
    pub endpoint: String,
    pub metadata_token_url: String,
    /// Static bearer token; when unset a token is requested from the metadata server
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl Default for SecretManagerSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            metadata_token_url: DEFAULT_METADATA_TOKEN_URL.to_string(),
            access_token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Negative outcomes of a secret fetch
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret {0} not found")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("secret manager unavailable: {0}")]
    Unavailable(String),

    #[error("malformed secret payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    #[serde(default)]
    name: String,
    payload: Option<SecretPayload>,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

/// Normalize a secret resource name to a specific version
///
/// `projects/p/secrets/s` becomes `projects/p/secrets/s/versions/latest`.
pub fn version_name(resource: &str) -> String {
    let resource = resource.trim().trim_matches('/');
    if resource.contains("/versions/") {
        resource.to_string()
    } else {
        format!("{resource}/versions/latest")
    }
}

/// Scoped connection to Secret Manager
pub struct SecretSession {
    http: Option<Client>,
    endpoint: String,
    token: String,
}

impl SecretSession {
    /// Open a session, obtaining a bearer token if none is configured
    pub async fn open(settings: &SecretManagerSettings) -> Result<Self, SecretError> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| SecretError::Unavailable(e.to_string()))?;

        let token = match &settings.access_token {
            Some(token) => token.clone(),
            None => metadata_token(&http, &settings.metadata_token_url).await?,
        };

        debug!(endpoint = %settings.endpoint, "Secret Manager session opened");

        Ok(Self {
            http: Some(http),
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Fetch and decode the payload of one secret version
    pub async fn access_version(&self, resource: &str) -> Result<Vec<u8>, SecretError> {
        let http = self
            .http
            .as_ref()
            .ok_or_else(|| SecretError::Unavailable("session already released".to_string()))?;

        let name = version_name(resource);
        let url = format!("{}/v1/{}:access", self.endpoint, name);

        let response = http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SecretError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &name, body));
        }

        let body: AccessSecretVersionResponse = response
            .json()
            .await
            .map_err(|e| SecretError::Malformed(e.to_string()))?;

        let data = body
            .payload
            .and_then(|p| p.data)
            .ok_or_else(|| SecretError::Malformed(format!("{name} has no payload data")))?;

        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| SecretError::Malformed(e.to_string()))?;

        info!(secret = %body.name, bytes = bytes.len(), "Fetched secret version");
        Ok(bytes)
    }

    /// Release the session
    pub fn close(mut self) {
        self.release();
    }

    pub fn is_open(&self) -> bool {
        self.http.is_some()
    }

    fn release(&mut self) {
        if self.http.take().is_some() {
            self.token.clear();
            #[cfg(test)]
            tests::RELEASED.with(|released| released.set(released.get() + 1));
            debug!(endpoint = %self.endpoint, "Secret Manager session released");
        }
    }
}

impl Drop for SecretSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Fetch one secret version inside a scoped session
pub async fn fetch_secret(
    settings: &SecretManagerSettings,
    resource: &str,
) -> Result<Vec<u8>, SecretError> {
    let session = SecretSession::open(settings).await?;
    let result = session.access_version(resource).await;
    session.close();
    result
}

async fn metadata_token(http: &Client, url: &str) -> Result<String, SecretError> {
    let response = http
        .get(url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| SecretError::PermissionDenied(format!("no access token available: {e}")))?;

    if !response.status().is_success() {
        return Err(SecretError::PermissionDenied(format!(
            "metadata server returned {}",
            response.status()
        )));
    }

    let token: MetadataToken = response
        .json()
        .await
        .map_err(|e| SecretError::PermissionDenied(format!("invalid token response: {e}")))?;

    Ok(token.access_token)
}

fn classify_status(status: StatusCode, name: &str, body: String) -> SecretError {
    match status {
        StatusCode::NOT_FOUND => SecretError::NotFound(name.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SecretError::PermissionDenied(format!("{name}: {body}"))
        }
        _ => SecretError::Unavailable(format!("{status}: {body}")),
    }
}
