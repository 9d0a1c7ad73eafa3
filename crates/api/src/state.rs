use std::sync::Arc;

use snapbooth_comfyui::api::ComfyApi;
use snapbooth_comfyui::artifacts::ArtifactStore;
use snapbooth_comfyui::store::JobStore;
use snapbooth_core::workflow::WorkflowLibrary;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// Cheaply cloneable; inner data is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// ComfyUI REST client.
    pub comfy: Arc<ComfyApi>,
    /// Per-job progress state shared with the push-channel ingestor.
    pub store: Arc<JobStore>,
    /// Workflow style library.
    pub library: Arc<WorkflowLibrary>,
    /// Local artifact persistence (gallery output directory).
    pub artifacts: Arc<ArtifactStore>,
}

impl AppState {
    /// Build the full state from configuration.
    pub fn from_config(config: ServerConfig) -> Self {
        let comfy = Arc::new(ComfyApi::new(config.comfy_url.clone()));
        let library = Arc::new(WorkflowLibrary::new(config.workflow_dir.clone()));
        let artifacts = Arc::new(ArtifactStore::new(config.gallery_output_dir()));

        Self {
            config: Arc::new(config),
            comfy,
            store: Arc::new(JobStore::new()),
            library,
            artifacts,
        }
    }
}
