//! HTTP implementation of the upstream provider seam.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{CompletionRequest, UpstreamProvider};
use crate::types::{Completion, Usage};
use crate::{Error, Result};

/// Default bound on one upstream call; after this the request fails as
/// retryable and no usage is recorded.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

const API_VERSION: &str = "2023-06-01";

/// Provider client over HTTP with a bounded per-request timeout.
pub struct HttpUpstream {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl HttpUpstream {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Result<Self> {
        Self::with_timeout(base_url, api_key, DEFAULT_UPSTREAM_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for HttpUpstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpUpstream")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Successful completion body, reduced to what the ledger needs.
#[derive(Debug, Deserialize)]
struct WireCompletion {
    #[serde(default)]
    content: Vec<WireContent>,
    #[serde(default)]
    usage: Usage,
}

/// Content blocks in the completion; non-text blocks are ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireContent {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Error envelope: `{"type":"error","error":{"type":...,"message":...}}`.
#[derive(Debug, Deserialize)]
struct WireError {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
}

fn transport_error(err: reqwest::Error) -> Error {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        err.to_string()
    };
    Error::UpstreamUnreachable { message }
}

#[async_trait]
impl UpstreamProvider for HttpUpstream {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let model = request.model.clone();
        tracing::debug!(model = %model, "forwarding completion request upstream");

        let response = self
            .http
            .post(self.endpoint())
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let message = serde_json::from_str::<WireError>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            tracing::warn!(model = %model, status = %status, "upstream returned an error");
            return Err(Error::Upstream { message });
        }

        let wire: WireCompletion = serde_json::from_str(&body).map_err(|e| Error::Upstream {
            message: format!("malformed completion body: {e}"),
        })?;

        let text = wire
            .content
            .into_iter()
            .filter_map(|block| match block {
                WireContent::Text { text } => Some(text),
                WireContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(Completion {
            text,
            usage: wire.usage,
        })
    }
}
