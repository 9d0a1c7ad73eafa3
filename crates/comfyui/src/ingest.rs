//! Push-channel event loop.
//!
//! Reads frames from the ComfyUI WebSocket, normalizes them via
//! [`crate::messages`], and applies them to the shared [`JobStore`]. Runs
//! as one long-lived task per process: connect, process until the
//! connection drops, reconnect at a fixed cadence, forever.

use std::sync::Arc;

use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use snapbooth_core::types::PromptId;

use crate::client::ComfyClient;
use crate::messages::{normalize_frame, PushEvent};
use crate::outputs::resolve_output_image;
use crate::reconnect::{reconnect_loop, ReconnectConfig};
use crate::store::JobStore;

/// Run the push-channel subscription until cancelled.
///
/// Maintains exactly one connection: connect, mark the channel ready,
/// process frames until the stream ends, mark it not-ready, reconnect.
/// Polling covers the gaps, so a dropped channel is never surfaced to
/// callers.
pub async fn run_channel(client: ComfyClient, store: Arc<JobStore>, cancel: CancellationToken) {
    let reconnect_config = ReconnectConfig::default();

    loop {
        let conn = match client.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "Push channel connect failed, entering reconnect loop");
                match reconnect_loop(&client, &reconnect_config, &cancel).await {
                    Some(conn) => conn,
                    None => return, // cancelled
                }
            }
        };

        store.set_channel_ready(true);
        let mut ws_stream = conn.ws_stream;
        process_messages(&mut ws_stream, &store).await;
        store.set_channel_ready(false);

        if cancel.is_cancelled() {
            return;
        }

        tracing::info!("Push channel lost, entering reconnect loop");
        match reconnect_loop(&client, &reconnect_config, &cancel).await {
            Some(_) => continue,
            None => return,
        }
    }
}

/// Process frames until the connection closes or errors.
///
/// Binary frames carry low-fidelity preview images and are skipped; the
/// polled preview reference covers that. Malformed JSON frames are
/// dropped so one bad frame cannot take the channel down.
pub async fn process_messages(
    ws_stream: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    store: &JobStore,
) {
    while let Some(msg_result) = ws_stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let Ok(frame) = serde_json::from_str::<serde_json::Value>(&text) else {
                    tracing::trace!("Dropping malformed push frame");
                    continue;
                };
                if let Some(event) = normalize_frame(&frame) {
                    handle_event(store, event).await;
                }
            }
            Ok(Message::Binary(_)) => {
                tracing::trace!("Ignoring binary push frame (preview image)");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                // Handled automatically by tungstenite.
            }
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "Push channel closed");
                break;
            }
            Ok(Message::Frame(_)) => {}
            Err(e) => {
                tracing::error!(error = %e, "Push channel receive error");
                break;
            }
        }
    }
}

/// Apply one normalized push event to the store.
pub async fn handle_event(store: &JobStore, event: PushEvent) {
    match event {
        PushEvent::Progress {
            prompt_id,
            node,
            value,
            max,
        } => {
            let Some(prompt_id) = resolve_job(store, prompt_id).await else {
                return;
            };

            let weighted = match node {
                Some(ref node_id) => {
                    store
                        .apply_node_progress(&prompt_id, node_id, value, max)
                        .await
                }
                None => None,
            };
            let percent = weighted.unwrap_or(if max > 0.0 { value / max * 100.0 } else { 0.0 });

            tracing::debug!(
                prompt_id = %prompt_id,
                node = node.as_deref().unwrap_or("-"),
                value,
                max,
                percent,
                "Generation progress",
            );
            store
                .record_socket_progress(&prompt_id, percent, false)
                .await;
        }
        PushEvent::OutputReady { prompt_id, output } => {
            let Some(prompt_id) = resolve_job(store, prompt_id).await else {
                return;
            };
            if let Some(image) = resolve_output_image(&output) {
                tracing::info!(
                    prompt_id = %prompt_id,
                    filename = %image.filename,
                    "Output announced on push channel",
                );
                store.record_output(&prompt_id, image).await;
            }
        }
        PushEvent::NodesDone { prompt_id } => {
            let Some(prompt_id) = resolve_job(store, prompt_id).await else {
                return;
            };
            tracing::info!(prompt_id = %prompt_id, "Execution completed (all nodes done)");
            store.record_socket_progress(&prompt_id, 100.0, true).await;
        }
    }
}

/// Resolve which job a push event belongs to.
///
/// Prefers the id extracted from the frame; falls back to the most
/// recently submitted prompt. The channel is single-tenant per booth
/// process, so the fallback is safe.
async fn resolve_job(store: &JobStore, prompt_id: Option<String>) -> Option<PromptId> {
    match prompt_id {
        Some(id) => Some(id),
        None => store.last_prompt_id().await,
    }
}
