//! WebSocket client for connecting to a ComfyUI instance.
//!
//! [`ComfyUIClient`] holds the WebSocket base URL. Call
//! [`ComfyUIClient::connect`] with a per-job client id to open a
//! [`ComfyUIConnection`] that receives that job's progress messages.

use tokio_tungstenite::{connect_async, MaybeTlsStream};

/// The raw WebSocket stream type used for ComfyUI connections.
pub type ComfyUIStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for a ComfyUI instance.
pub struct ComfyUIClient {
    ws_url: String,
}

/// A live WebSocket connection scoped to one client id.
#[derive(Debug)]
pub struct ComfyUIConnection {
    /// Client id sent during the handshake and with the submission.
    pub client_id: String,
    pub ws_stream: ComfyUIStream,
}

impl ComfyUIClient {
    /// * `ws_url` - WebSocket base URL, e.g. `ws://host:8188`.
    pub fn new(ws_url: String) -> Self {
        let ws_url = ws_url.trim_end_matches('/').to_string();
        Self { ws_url }
    }

    /// Full endpoint URL for a given client id.
    pub fn endpoint(&self, client_id: &str) -> String {
        format!("{}/ws?clientId={}", self.ws_url, client_id)
    }

    /// Connect to `/ws?clientId={client_id}`.
    ///
    /// ComfyUI only delivers execution messages for prompts submitted
    /// with the same `client_id`.
    pub async fn connect(&self, client_id: &str) -> Result<ComfyUIConnection, ComfyUIClientError> {
        let url = self.endpoint(client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ComfyUIClientError::Connection(format!(
                "Failed to connect to ComfyUI at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(client_id, "Connected to ComfyUI at {}", self.ws_url);

        Ok(ComfyUIConnection {
            client_id: client_id.to_string(),
            ws_stream,
        })
    }
}

impl ComfyUIConnection {
    /// Send a close frame. Failures are logged, the stream is dropped
    /// either way.
    pub async fn close(mut self) {
        if let Err(e) = self.ws_stream.close(None).await {
            tracing::debug!(client_id = %self.client_id, error = %e, "WebSocket close failed");
        }
    }
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIClientError {
    /// Failed to establish the initial WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}
