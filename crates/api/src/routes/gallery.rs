//! Gallery of past captures.
//!
//! Every queued capture archives its input frame, and the reconciliation
//! engine saves the generated artifact next to it. The gallery lists the
//! pairs and serves the files back to the kiosk.

use std::path::Path;
use std::time::UNIX_EPOCH;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use snapbooth_core::error::CoreError;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct GalleryItem {
    pub id: String,
    pub input_url: String,
    pub output_url: String,
    /// Last modification of the output file, unix millis.
    pub updated_at: i64,
}

/// GET /api/v1/gallery
///
/// Lists captures that have both an archived input frame and a saved
/// output artifact, newest first.
pub async fn list_gallery(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let output_dir = state.config.gallery_output_dir();
    let input_dir = state.config.gallery_input_dir();

    let mut items = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(&output_dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("png") {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Orphan outputs (no paired capture) are not listed.
            if !input_dir.join(file_name).is_file() {
                continue;
            }

            let updated_at = entry
                .metadata()
                .await
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0);

            let encoded = urlencoding::encode(file_name).into_owned();
            items.push(GalleryItem {
                id: id.to_string(),
                input_url: format!("/api/v1/gallery/image?type=input&name={encoded}"),
                output_url: format!("/api/v1/gallery/image?type=output&name={encoded}"),
                updated_at,
            });
        }
    }

    items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(Json(DataResponse { data: items }))
}

#[derive(Debug, Deserialize)]
pub struct GalleryImageParams {
    /// `input` or `output`.
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

/// GET /api/v1/gallery/image?type=&name=
///
/// Serves a saved capture image. The name is reduced to its final path
/// component so the request cannot escape the gallery directories.
pub async fn gallery_image(
    State(state): State<AppState>,
    Query(params): Query<GalleryImageParams>,
) -> AppResult<impl IntoResponse> {
    let base = match params.kind.as_str() {
        "input" => state.config.gallery_input_dir(),
        "output" => state.config.gallery_output_dir(),
        _ => return Err(AppError::BadRequest("Invalid type".into())),
    };

    let name = Path::new(&params.name)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::BadRequest("Invalid name".into()))?;

    let bytes = tokio::fs::read(base.join(name)).await.map_err(|_| {
        AppError::Core(CoreError::NotFound {
            entity: "Gallery image",
            name: name.to_string(),
        })
    })?;

    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}
