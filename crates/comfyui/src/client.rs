//! WebSocket client for the ComfyUI push channel.
//!
//! [`ComfyClient`] holds the connection configuration; call
//! [`ComfyClient::connect`] to establish a live [`ComfyConnection`]. The
//! booth keeps exactly one subscription per process, announced with a
//! fixed client id so the server addresses push frames back to it.

use tokio_tungstenite::{connect_async, MaybeTlsStream};

/// Connection configuration for the push channel.
pub struct ComfyClient {
    ws_url: String,
    client_id: String,
}

/// A live WebSocket connection to the ComfyUI push channel.
pub struct ComfyConnection {
    /// Client id announced during the handshake.
    pub client_id: String,
    /// The raw WebSocket stream for reading frames.
    pub ws_stream: tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl ComfyClient {
    /// Create a client from the server's HTTP base URL and the process's
    /// client id.
    ///
    /// The WebSocket URL is the HTTP URL with the scheme swapped
    /// (`http` → `ws`, `https` → `wss`).
    pub fn new(api_url: &str, client_id: impl Into<String>) -> Self {
        let ws_url = if let Some(rest) = api_url.strip_prefix("https") {
            format!("wss{rest}")
        } else if let Some(rest) = api_url.strip_prefix("http") {
            format!("ws{rest}")
        } else {
            api_url.to_string()
        };

        Self {
            ws_url,
            client_id: client_id.into(),
        }
    }

    /// WebSocket base URL (e.g. `ws://host:8188`).
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Client id announced on every connect.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Connect to `{ws_url}/ws?clientId=<id>`.
    pub async fn connect(&self) -> Result<ComfyConnection, ComfyClientError> {
        let url = format!("{}/ws?clientId={}", self.ws_url, self.client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ComfyClientError::Connection(format!(
                "Failed to connect to ComfyUI at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(
            client_id = %self.client_id,
            "Connected to ComfyUI push channel at {}",
            self.ws_url,
        );

        Ok(ComfyConnection {
            client_id: self.client_id.clone(),
            ws_stream,
        })
    }
}

/// Errors from the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum ComfyClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}
