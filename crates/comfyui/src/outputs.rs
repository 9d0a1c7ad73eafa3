//! Output-image resolution across ComfyUI response shapes.
//!
//! The location of the output descriptors in a history item (or an
//! `executed` push payload) has moved between ComfyUI versions. The
//! resolver probes every known nesting in order and picks the first image
//! explicitly tagged `type: "output"` — `temp` entries are in-progress
//! previews and must never be mistaken for the final artifact.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use snapbooth_core::types::PromptId;

/// Reference to a generated artifact on the ComfyUI server.
///
/// The triple maps directly onto the `/view` endpoint's query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputImage {
    pub filename: String,
    /// `output`, `temp`, or `input`.
    #[serde(rename = "type", default = "default_image_type")]
    pub image_type: String,
    #[serde(default)]
    pub subfolder: String,
}

fn default_image_type() -> String {
    "output".to_string()
}

/// Pick the first `type: "output"` image from an `images` list.
fn pick_output(images: &Value) -> Option<OutputImage> {
    let list = images.as_array()?;
    list.iter()
        .find(|image| image.get("type").and_then(|t| t.as_str()) == Some("output"))
        .and_then(|image| serde_json::from_value(image.clone()).ok())
}

/// Resolve the single output image of a history item or `executed`
/// payload.
///
/// Probes, in order: a top-level `outputs` mapping, then
/// `result.outputs`, `result.output`, and `output`; within the first
/// mapping found, every node-keyed entry's `images` list is scanned.
/// Falls back to a top-level `images` list on the payload itself.
/// `None` means "not yet available", not an error.
pub fn resolve_output_image(payload: &Value) -> Option<OutputImage> {
    let outputs = payload
        .get("outputs")
        .or_else(|| payload.get("result").and_then(|r| r.get("outputs")))
        .or_else(|| payload.get("result").and_then(|r| r.get("output")))
        .or_else(|| payload.get("output"));

    if let Some(mapping) = outputs.and_then(|o| o.as_object()) {
        for entry in mapping.values() {
            if let Some(image) = entry.get("images").and_then(pick_output) {
                return Some(image);
            }
        }
    }

    payload.get("images").and_then(pick_output)
}

/// Unwrap the history item for a prompt from a `/history/<id>` response.
///
/// The response may be keyed by the prompt id, nested under a `history`
/// key, or already be the item itself.
pub fn history_entry<'a>(response: &'a Value, prompt_id: &PromptId) -> &'a Value {
    response
        .get(prompt_id)
        .or_else(|| response.get("history").and_then(|h| h.get(prompt_id)))
        .unwrap_or(response)
}
