//! REST client for the ComfyUI HTTP endpoints.
//!
//! Wraps workflow submission, progress/history polling, and artifact
//! retrieval using [`reqwest`]. Transport failures and non-2xx responses
//! are kept apart: the reconciliation engine degrades a failed poll to
//! "no data" while a failed submission is surfaced to the caller.

use serde::Deserialize;
use serde_json::Value;

use crate::outputs::OutputImage;

/// HTTP client for a single ComfyUI server.
pub struct ComfyApi {
    client: reqwest::Client,
    base_url: String,
}

/// Response from the `/prompt` endpoint after queuing a workflow.
///
/// `prompt_id` has been observed absent on some server builds; callers
/// fall back to a locally generated id and key all later lookups by
/// whichever id was actually used.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub prompt_id: Option<String>,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: Option<i64>,
}

/// Errors from the ComfyUI REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyApiError {
    /// Transport-level failure (network, DNS, TLS).
    #[error("ComfyUI connection error: {0}")]
    Connection(#[from] reqwest::Error),

    /// ComfyUI responded with a non-2xx status.
    #[error("ComfyUI error ({status}): {body}")]
    Upstream { status: u16, body: String },
}

impl ComfyApi {
    /// Create a client for the server at `base_url` (e.g.
    /// `http://127.0.0.1:8188`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Base HTTP URL of the server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Queue a workflow for execution.
    ///
    /// Sends `POST /prompt` with `{prompt, client_id}`.
    pub async fn submit_prompt(
        &self,
        workflow: &Value,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.base_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Poll live progress for a prompt.
    ///
    /// The response shape is not contractually fixed upstream; the raw
    /// JSON is returned for the reconciliation engine to probe.
    pub async fn get_progress(&self, prompt_id: &str) -> Result<Value, ComfyApiError> {
        let response = self
            .client
            .get(format!("{}/progress", self.base_url))
            .query(&[("prompt_id", prompt_id)])
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Retrieve the history record for a prompt.
    pub async fn get_history(&self, prompt_id: &str) -> Result<Value, ComfyApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.base_url, prompt_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the raw bytes of a generated artifact via `/view`.
    pub async fn fetch_view(&self, image: &OutputImage) -> Result<Vec<u8>, ComfyApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.base_url))
            .query(&[
                ("filename", image.filename.as_str()),
                ("type", image.image_type.as_str()),
                ("subfolder", image.subfolder.as_str()),
            ])
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or an
    /// [`ComfyApiError::Upstream`] carrying the status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyApiError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn submit_prompt_posts_workflow_and_client_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/prompt"))
            .and(body_partial_json(json!({"client_id": "booth-1"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"prompt_id": "p1", "number": 3})),
            )
            .mount(&server)
            .await;

        let api = ComfyApi::new(server.uri());
        let workflow = json!({"3": {"class_type": "KSampler", "inputs": {"steps": 20}}});
        let response = api.submit_prompt(&workflow, "booth-1").await.unwrap();
        assert_eq!(response.prompt_id.as_deref(), Some("p1"));
        assert_eq!(response.number, Some(3));
    }

    #[tokio::test]
    async fn submit_prompt_tolerates_missing_prompt_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/prompt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let api = ComfyApi::new(server.uri());
        let response = api.submit_prompt(&json!({}), "booth-1").await.unwrap();
        assert_eq!(response.prompt_id, None);
    }

    #[tokio::test]
    async fn non_success_status_surfaces_body_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/prompt"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid workflow"))
            .mount(&server)
            .await;

        let api = ComfyApi::new(server.uri());
        let err = api.submit_prompt(&json!({}), "booth-1").await.unwrap_err();
        assert_matches!(
            err,
            ComfyApiError::Upstream { status: 400, ref body } if body == "invalid workflow"
        );
    }

    #[tokio::test]
    async fn get_progress_passes_prompt_id_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/progress"))
            .and(query_param("prompt_id", "p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": 5, "max": 10})))
            .mount(&server)
            .await;

        let api = ComfyApi::new(server.uri());
        let progress = api.get_progress("p1").await.unwrap();
        assert_eq!(progress["value"], 5);
    }

    #[tokio::test]
    async fn fetch_view_returns_raw_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/view"))
            .and(query_param("filename", "a.png"))
            .and(query_param("type", "output"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNGDATA".to_vec()))
            .mount(&server)
            .await;

        let api = ComfyApi::new(server.uri());
        let image = OutputImage {
            filename: "a.png".into(),
            image_type: "output".into(),
            subfolder: "".into(),
        };
        assert_eq!(api.fetch_view(&image).await.unwrap(), b"PNGDATA");
    }

    #[tokio::test]
    async fn connection_failure_maps_to_connection_error() {
        // Port 9 (discard) is almost certainly closed.
        let api = ComfyApi::new("http://127.0.0.1:9");
        let err = api.get_history("p1").await.unwrap_err();
        assert_matches!(err, ComfyApiError::Connection(_));
    }
}
