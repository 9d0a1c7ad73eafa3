//! Capture submission, progress polling, and artifact proxying.
//!
//! Routes:
//! - `POST /api/v1/selfie`   — queue a generation for a captured frame
//! - `GET  /api/v1/progress` — unified progress snapshot for a prompt
//! - `GET  /api/v1/output`   — proxy artifact bytes from ComfyUI `/view`

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use snapbooth_comfyui::outputs::OutputImage;
use snapbooth_comfyui::reconcile::{reconcile, JobOutput};
use snapbooth_comfyui::steps::StepTable;
use snapbooth_core::capture::{decode_data_url, new_capture_id};
use snapbooth_core::workflow::{apply_image_override, apply_prompt_override};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SelfieRequest {
    /// Workflow style name.
    pub style: String,
    /// Captured frame as a base64 image data URL.
    pub image: String,
    /// Optional prompt override applied to multiline-text nodes.
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub status: &'static str,
    pub prompt_id: String,
}

/// POST /api/v1/selfie
///
/// Validates and decodes the capture, writes it where ComfyUI picks it
/// up (and into the gallery), rewrites the style workflow for this
/// capture, queues it, and registers the job for progress tracking.
pub async fn queue_selfie(
    State(state): State<AppState>,
    Json(input): Json<SelfieRequest>,
) -> AppResult<impl IntoResponse> {
    // Validation happens before anything is written or sent.
    let frame = decode_data_url(&input.image).map_err(AppError::Core)?;
    let capture_id = new_capture_id();

    write_capture(&state, &capture_id, &frame).await?;

    let mut workflow = state.library.load(&input.style).map_err(AppError::Core)?;
    if let Some(prompt) = input.prompt.as_deref() {
        apply_prompt_override(&mut workflow, prompt);
    }
    let input_name = state
        .config
        .comfy_input_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("input.png")
        .to_string();
    apply_image_override(&mut workflow, &input_name, &capture_id);

    tracing::info!(
        style = %input.style,
        capture_id = %capture_id,
        client_id = %state.config.comfy_client_id,
        "Queueing ComfyUI prompt",
    );

    let submitted = state
        .comfy
        .submit_prompt(&workflow, &state.config.comfy_client_id)
        .await?;

    // ComfyUI normally assigns the id; fall back to a local one and key
    // all later lookups by whichever id we hand back here.
    let prompt_id = submitted
        .prompt_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let table = StepTable::from_workflow(&workflow);
    state.store.register_job(&prompt_id, &capture_id, table).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: QueuedResponse {
                status: "queued",
                prompt_id,
            },
        }),
    ))
}

/// Write the decoded frame to the ComfyUI input path and archive it in
/// the gallery input directory.
async fn write_capture(state: &AppState, capture_id: &str, frame: &[u8]) -> AppResult<()> {
    let comfy_input = &state.config.comfy_input_path;
    if let Some(parent) = comfy_input.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to create input dir: {e}")))?;
    }
    tokio::fs::write(comfy_input, frame)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to write capture: {e}")))?;

    let input_dir = state.config.gallery_input_dir();
    tokio::fs::create_dir_all(&input_dir)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to create gallery dir: {e}")))?;
    tokio::fs::write(input_dir.join(format!("{capture_id}.png")), frame)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to archive capture: {e}")))?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ProgressParams {
    #[serde(default)]
    pub prompt_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub percent: f64,
    pub label: &'static str,
    pub complete: bool,
    pub websocket_connected: bool,
    pub output_url: Option<String>,
    pub preview_url: Option<String>,
}

/// GET /api/v1/progress?prompt_id=...
///
/// Runs the reconciliation engine for the prompt and renders the
/// resolved references as URLs the kiosk can fetch.
pub async fn get_progress(
    State(state): State<AppState>,
    Query(params): Query<ProgressParams>,
) -> AppResult<impl IntoResponse> {
    let prompt_id = params
        .prompt_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing prompt_id".into()))?;

    let snapshot = reconcile(&state.comfy, &state.store, &state.artifacts, &prompt_id).await;

    let output_url = snapshot.output.as_ref().map(|output| match output {
        JobOutput::Remote(image) => view_proxy_url(image),
        JobOutput::Saved { file_name } => format!(
            "/api/v1/gallery/image?type=output&name={}",
            urlencoding::encode(file_name)
        ),
    });
    let preview_url = snapshot.preview.as_ref().map(view_proxy_url);

    Ok(Json(DataResponse {
        data: ProgressResponse {
            percent: snapshot.percent,
            label: snapshot.label,
            complete: snapshot.complete,
            websocket_connected: snapshot.channel_ready,
            output_url,
            preview_url,
        },
    }))
}

/// Render an output reference as a URL of the artifact proxy route.
fn view_proxy_url(image: &OutputImage) -> String {
    format!(
        "/api/v1/output?filename={}&type={}&subfolder={}",
        urlencoding::encode(&image.filename),
        urlencoding::encode(&image.image_type),
        urlencoding::encode(&image.subfolder),
    )
}

#[derive(Debug, Deserialize)]
pub struct OutputParams {
    pub filename: String,
    #[serde(rename = "type", default = "default_image_type")]
    pub image_type: String,
    #[serde(default)]
    pub subfolder: String,
}

fn default_image_type() -> String {
    "output".to_string()
}

/// GET /api/v1/output?filename=&type=&subfolder=
///
/// Streams the artifact bytes from the ComfyUI `/view` endpoint so the
/// kiosk never talks to the execution server directly.
pub async fn fetch_output(
    State(state): State<AppState>,
    Query(params): Query<OutputParams>,
) -> AppResult<impl IntoResponse> {
    let image = OutputImage {
        filename: params.filename,
        image_type: params.image_type,
        subfolder: params.subfolder,
    };
    let bytes = state.comfy.fetch_view(&image).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}
