//! Daemon REST Client
//!
//! Every non-streaming daemon endpoint answers with the same envelope:
//!
//! ```json
//! {"ok": true, "result": <json>, "error": ""}
//! ```
//!
//! [`ApiClient`] wraps `get`/`post` around it. The chat endpoint bypasses the
//! envelope entirely because its body has to be read incrementally; see
//! [`crate::producer`].

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Build the HTTP client shared by REST and chat calls
///
/// Only the connect phase is bounded here; a chat stream may legitimately
/// stay open for as long as the daemon keeps generating.
pub(crate) fn build_http_client(connect_timeout: Duration) -> Result<reqwest::Client, ClientError> {
    Ok(reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()?)
}

/// The daemon's `{ok, result, error}` response wrapper
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope {
    /// Whether the call succeeded
    #[serde(default)]
    pub ok: bool,
    /// Payload on success
    #[serde(default)]
    pub result: serde_json::Value,
    /// Message on failure
    #[serde(default)]
    pub error: String,
}

impl ApiEnvelope {
    /// Unwrap the payload, turning `ok: false` into [`ClientError::Api`]
    pub fn into_result(self) -> Result<serde_json::Value, ClientError> {
        if self.ok {
            Ok(self.result)
        } else if self.error.is_empty() {
            Err(ClientError::Api("request failed".to_string()))
        } else {
            Err(ClientError::Api(self.error))
        }
    }

    /// Unwrap and deserialize the payload
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        Ok(serde_json::from_value(self.into_result()?)?)
    }
}

/// A model the daemon can chat with
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelInfo {
    /// Model identifier
    pub name: String,
    /// Provider that serves it, when reported
    pub provider: Option<String>,
}

impl ModelInfo {
    fn from_value(value: &serde_json::Value) -> Option<Self> {
        if let Some(name) = value.as_str() {
            return Some(Self {
                name: name.to_string(),
                provider: None,
            });
        }
        let name = value.get("name")?.as_str()?.to_string();
        let provider = value
            .get("provider")
            .and_then(|p| p.as_str())
            .map(String::from);
        Some(Self { name, provider })
    }
}

/// Envelope client for the daemon's REST endpoints
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http_client: reqwest::Client,
    request_timeout: Duration,
}

impl ApiClient {
    /// Create a client from configuration
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client: build_http_client(config.connect_timeout)?,
            request_timeout: config.request_timeout,
        })
    }

    /// Get the base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `GET path` and decode the envelope
    pub async fn get(&self, path: &str) -> Result<ApiEnvelope, ClientError> {
        let response = self
            .http_client
            .get(self.url(path))
            .timeout(self.request_timeout)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// `POST path` with a JSON body and decode the envelope
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiEnvelope, ClientError> {
        let response = self
            .http_client
            .post(self.url(path))
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Decode an envelope, whatever the status
    ///
    /// The daemon reports most failures as `ok: false` with a 4xx/5xx status;
    /// a body that is not an envelope becomes [`ClientError::Status`].
    async fn decode(response: reqwest::Response) -> Result<ApiEnvelope, ClientError> {
        let status = response.status();
        let bytes = response.bytes().await?;

        match serde_json::from_slice::<ApiEnvelope>(&bytes) {
            Ok(envelope) => Ok(envelope),
            Err(_) if !status.is_success() => Err(ClientError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).trim().to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the daemon answers at all
    pub async fn health(&self) -> bool {
        match self
            .http_client
            .get(self.url("/api/health"))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "Daemon health check failed");
                false
            }
        }
    }

    /// Models the daemon can chat with
    ///
    /// `result` may be a list of names or a list of `{name, provider}` objects.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ClientError> {
        let result = self.get("/api/models").await?.into_result()?;

        let models = result
            .as_array()
            .map(|arr| arr.iter().filter_map(ModelInfo::from_value).collect())
            .unwrap_or_default();

        Ok(models)
    }

    /// Daemon-provided procedures
    ///
    /// The daemon has no endpoint for this yet, so the list is always empty
    /// and no request is made.
    #[allow(clippy::unused_async)]
    pub async fn list_procedures(&self) -> Result<Vec<String>, ClientError> {
        Ok(Vec::new())
    }
}
