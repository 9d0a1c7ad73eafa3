use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snapbooth_api::config::ServerConfig;
use snapbooth_api::router::build_app_router;
use snapbooth_api::state::AppState;
use snapbooth_comfyui::client::ComfyClient;
use snapbooth_comfyui::ingest::run_channel;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snapbooth_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        comfy_url = %config.comfy_url,
        "Loaded server configuration",
    );

    // --- Gallery directories ---
    tokio::fs::create_dir_all(config.gallery_input_dir())
        .await
        .expect("Failed to create gallery input directory");
    tokio::fs::create_dir_all(config.gallery_output_dir())
        .await
        .expect("Failed to create gallery output directory");

    // --- Shared state ---
    let state = AppState::from_config(config.clone());

    // --- Push channel ---
    let cancel = CancellationToken::new();
    let client = ComfyClient::new(&config.comfy_url, config.comfy_client_id.clone());
    let channel_handle = tokio::spawn(run_channel(
        client,
        Arc::clone(&state.store),
        cancel.clone(),
    ));
    tracing::info!("ComfyUI push-channel task started");

    // --- Router / server ---
    let app = build_app_router(state, &config);

    let addr = SocketAddr::new(config.host.parse().expect("Invalid HOST"), config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .unwrap();

    // Stop the push-channel task before exiting.
    cancel.cancel();
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), channel_handle).await;
    tracing::info!("Shut down complete");
}
