//! Workflow style listing.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/styles
///
/// Returns the selectable workflow style names for the kiosk UI.
pub async fn list_styles(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let styles = state.library.list_styles();
    Ok(Json(DataResponse { data: styles }))
}
