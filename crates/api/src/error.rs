use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use snapbooth_comfyui::api::ComfyApiError;
use snapbooth_core::error::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`ComfyApiError`] for
/// execution-server failures, and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `snapbooth_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The ComfyUI server failed or was unreachable.
    #[error(transparent)]
    Comfy(#[from] ComfyApiError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, name } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} '{name}' not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Execution-server errors ---
            AppError::Comfy(comfy) => match comfy {
                ComfyApiError::Upstream { status, body } => {
                    tracing::warn!(status, body = %body, "ComfyUI rejected the request");
                    (
                        StatusCode::BAD_GATEWAY,
                        "UPSTREAM_ERROR",
                        format!("ComfyUI error ({status}): {body}"),
                    )
                }
                ComfyApiError::Connection(err) => {
                    tracing::warn!(error = %err, "ComfyUI unreachable");
                    (
                        StatusCode::BAD_GATEWAY,
                        "UPSTREAM_UNREACHABLE",
                        "ComfyUI server is unreachable".to_string(),
                    )
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
