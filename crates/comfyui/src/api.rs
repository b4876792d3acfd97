//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps the endpoints a single job touches (root ping, workflow
//! submission, history retrieval, artifact download) using [`reqwest`].

use std::time::Duration;

use serde::Deserialize;

use crate::history::ArtifactDescriptor;

/// HTTP client for a single ComfyUI instance.
#[derive(Clone)]
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
    /// Overrides the client timeout for `/view` downloads.
    download_timeout: Option<Duration>,
}

/// Body returned by `POST /prompt`.
///
/// Every field is optional so a reply without `prompt_id` can be reported
/// as [`ComfyUIApiError::MissingPromptId`] instead of a decode failure.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    #[serde(default)]
    pub prompt_id: Option<String>,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: Option<i64>,
    /// Per-node validation problems reported alongside a queued prompt.
    #[serde(default)]
    pub node_errors: Option<serde_json::Value>,
}

/// A successfully queued workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedPrompt {
    pub prompt_id: String,
    pub number: Option<i64>,
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// `POST /prompt` succeeded but the body carried no `prompt_id`.
    #[error("ComfyUI response has no prompt_id")]
    MissingPromptId,
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    /// * `timeout` - Upper bound applied to every request.
    pub fn new(api_url: String, timeout: Duration) -> Result<Self, ComfyUIApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        let api_url = api_url.trim_end_matches('/').to_string();
        Self {
            client,
            api_url,
            download_timeout: None,
        }
    }

    /// Give `/view` downloads their own whole-request timeout.
    ///
    /// Large video outputs can take longer than the timeout used for the
    /// small JSON endpoints.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = Some(timeout);
        self
    }

    /// Base HTTP URL this client talks to.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Ping the server root with `GET /`.
    ///
    /// Returns the response status; interpreting it is left to the caller.
    pub async fn ping(&self) -> Result<reqwest::StatusCode, ComfyUIApiError> {
        let response = self.client.get(format!("{}/", self.api_url)).send().await?;
        Ok(response.status())
    }

    /// Submit a workflow for execution.
    ///
    /// Sends `POST /prompt` with `{"prompt": workflow, "client_id": client_id}`
    /// so that progress messages are routed to the WebSocket opened with
    /// the same client id.
    pub async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<QueuedPrompt, ComfyUIApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;

        if let Some(errors) = submitted.node_errors.as_ref() {
            if errors.as_object().is_some_and(|m| !m.is_empty()) {
                tracing::warn!(node_errors = %errors, "ComfyUI reported node errors on submit");
            }
        }

        let prompt_id = submitted
            .prompt_id
            .filter(|id| !id.is_empty())
            .ok_or(ComfyUIApiError::MissingPromptId)?;

        Ok(QueuedPrompt {
            prompt_id,
            number: submitted.number,
        })
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends `GET /history/{prompt_id}`. The body is keyed by prompt id;
    /// an unknown prompt yields `{}` rather than an error status.
    pub async fn get_history(&self, prompt_id: &str) -> Result<serde_json::Value, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Download the raw bytes of one produced artifact via `GET /view`.
    pub async fn view(&self, artifact: &ArtifactDescriptor) -> Result<Vec<u8>, ComfyUIApiError> {
        let mut request = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", artifact.filename.as_str()),
                ("subfolder", artifact.subfolder.as_str()),
                ("type", artifact.kind.as_str()),
            ]);
        if let Some(timeout) = self.download_timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyUIApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
