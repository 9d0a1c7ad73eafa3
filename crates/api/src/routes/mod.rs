pub mod booth;
pub mod gallery;
pub mod health;
pub mod styles;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// GET  /styles              selectable workflow styles
/// POST /selfie              queue a generation for a capture
/// GET  /progress            unified progress snapshot for a prompt
/// GET  /output              proxy artifact bytes from ComfyUI
/// GET  /gallery             paired input/output captures
/// GET  /gallery/image       serve a saved capture image
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/styles", get(styles::list_styles))
        .route("/selfie", post(booth::queue_selfie))
        .route("/progress", get(booth::get_progress))
        .route("/output", get(booth::fetch_output))
        .route("/gallery", get(gallery::list_gallery))
        .route("/gallery/image", get(gallery::gallery_image))
}
