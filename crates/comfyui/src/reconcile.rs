//! Progress reconciliation.
//!
//! Answers one question per call: how far along is this job, and where is
//! its picture? The answer is merged from two independent signals — the
//! push-derived state in the [`JobStore`] and a fresh poll of the
//! server's progress and history endpoints. Either signal may be absent
//! or stale at any moment; neither failure aborts the snapshot.

use serde_json::Value;

use snapbooth_core::types::PromptId;

use crate::api::ComfyApi;
use crate::artifacts::ArtifactStore;
use crate::outputs::{history_entry, resolve_output_image, OutputImage};
use crate::store::JobStore;

/// One unified view of a job's progress.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    /// Percent in `[0, 100]`.
    pub percent: f64,
    /// Short phase label for the kiosk UI.
    pub label: &'static str,
    /// Sticky: never reverts to `false` once reported `true`.
    pub complete: bool,
    /// The finished artifact, once resolved.
    pub output: Option<JobOutput>,
    /// Low-fidelity in-progress preview, only while incomplete.
    pub preview: Option<OutputImage>,
    /// Whether the push channel is currently connected.
    pub channel_ready: bool,
}

/// Where the finished artifact can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutput {
    /// Still on the ComfyUI server, addressed via `/view`.
    Remote(OutputImage),
    /// Only the locally saved copy remains (last-resort fallback).
    Saved { file_name: String },
}

/// Build a unified progress snapshot for a job.
///
/// Issues the live-progress and history polls concurrently and waits for
/// both to settle; a failed leg degrades to "no data". Merge policy:
///
/// - Fresh push state (within the 10 s window) can only be raised by the
///   poll, never lowered. Stale push state yields to any non-zero polled
///   percent.
/// - Completion is true if any signal says so (push complete flag,
///   history status, resolved output, or a previous snapshot) and is
///   sticky per job.
/// - A complete job with no derivable percent reports 100.
///
/// Side effects: newly detected completion discards the job's step table;
/// a newly resolved output for a paired capture is fetched and persisted
/// locally once.
pub async fn reconcile(
    api: &ComfyApi,
    store: &JobStore,
    artifacts: &ArtifactStore,
    prompt_id: &PromptId,
) -> ProgressSnapshot {
    let (progress_result, history_result) =
        tokio::join!(api.get_progress(prompt_id), api.get_history(prompt_id));

    let progress_response = match progress_result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(prompt_id = %prompt_id, error = %e, "Progress poll failed");
            None
        }
    };
    let history_response = match history_result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(prompt_id = %prompt_id, error = %e, "History poll failed");
            None
        }
    };

    let history_item = history_response
        .as_ref()
        .map(|response| history_entry(response, prompt_id));

    // Push-discovered output beats the history-derived one.
    let output_image = match store.output(prompt_id).await {
        Some(image) => Some(image),
        None => {
            let resolved = history_item.and_then(resolve_output_image);
            if let Some(ref image) = resolved {
                store.record_output(prompt_id, image.clone()).await;
            }
            resolved
        }
    };

    // Merge push and polled percentages.
    let socket = store.socket_progress(prompt_id).await;
    let socket_percent = socket.as_ref().map(|s| s.percent).unwrap_or(0.0);
    let socket_fresh = socket.as_ref().is_some_and(|s| s.is_fresh());

    let polled_payload = progress_response
        .as_ref()
        .map(|response| response.get("progress").unwrap_or(response));
    let polled_percent = polled_payload.map(parse_progress_percent).unwrap_or(0.0);

    let mut percent = if socket_fresh {
        socket_percent.max(polled_percent)
    } else if polled_percent > 0.0 {
        polled_percent
    } else {
        socket_percent
    };

    // Completion is true if ANY signal says so, and sticky per job.
    let history_status = history_item.and_then(|item| item.get("status"));
    let complete = socket.as_ref().is_some_and(|s| s.complete)
        || history_status
            .and_then(|s| s.get("completed"))
            .and_then(|c| c.as_bool())
            .unwrap_or(false)
        || history_status
            .and_then(|s| s.get("status_str"))
            .and_then(|s| s.as_str())
            == Some("success")
        || output_image.is_some()
        || store.is_complete(prompt_id).await;

    if complete {
        if store.mark_complete(prompt_id).await {
            tracing::info!(prompt_id = %prompt_id, "Job observed complete");
        }
        if percent <= 0.0 || !percent.is_finite() {
            percent = 100.0;
        }
    }
    let percent = if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    };

    let capture_id = store.capture_id(prompt_id).await;

    // Persist the artifact next to its capture, once.
    if let (Some(image), Some(capture)) = (&output_image, &capture_id) {
        if !store.is_saved(prompt_id).await {
            match api.fetch_view(image).await {
                Ok(bytes) => match artifacts.persist(capture, &bytes).await {
                    Ok(()) => {
                        store.mark_saved(prompt_id).await;
                    }
                    Err(e) => {
                        tracing::warn!(prompt_id = %prompt_id, error = %e, "Artifact save failed")
                    }
                },
                Err(e) => {
                    tracing::warn!(prompt_id = %prompt_id, error = %e, "Artifact fetch failed")
                }
            }
        }
    }

    let output = match output_image {
        Some(image) => Some(JobOutput::Remote(image)),
        None => capture_id
            .filter(|capture| artifacts.exists(capture))
            .map(|capture| JobOutput::Saved {
                file_name: ArtifactStore::file_name(&capture),
            }),
    };

    let preview = if complete {
        None
    } else {
        polled_payload.and_then(extract_preview)
    };

    ProgressSnapshot {
        percent,
        label: if complete { "Complete" } else { "Sampling" },
        complete,
        output,
        preview,
        channel_ready: store.channel_ready(),
    }
}

/// Extract a percentage from whichever shape the progress endpoint used.
///
/// Bare numbers at or below 1 are fractions needing ×100; larger numbers
/// are already percentages. Objects are probed for a `(value, max)` pair
/// under the known key spellings. Anything else reads as 0.
pub fn parse_progress_percent(payload: &Value) -> f64 {
    if let Some(number) = payload.as_f64() {
        return if number <= 1.0 { number * 100.0 } else { number };
    }

    let value = ["value", "current", "step", "steps"]
        .iter()
        .find_map(|key| payload.get(key).and_then(|v| v.as_f64()))
        .unwrap_or(0.0);
    let max = ["max", "total", "steps_total"]
        .iter()
        .find_map(|key| payload.get(key).and_then(|v| v.as_f64()))
        .unwrap_or(0.0);

    if !value.is_finite() || !max.is_finite() || max <= 0.0 {
        return 0.0;
    }
    value / max * 100.0
}

/// Pull an in-progress preview reference out of the polled payload.
///
/// Accepts either an image object or a bare filename string under the
/// `preview` / `preview_image` keys.
fn extract_preview(payload: &Value) -> Option<OutputImage> {
    let raw = payload.get("preview").or_else(|| payload.get("preview_image"))?;

    if let Some(filename) = raw.as_str() {
        return Some(OutputImage {
            filename: filename.to_string(),
            image_type: "temp".to_string(),
            subfolder: String::new(),
        });
    }
    serde_json::from_value(raw.clone()).ok()
}
