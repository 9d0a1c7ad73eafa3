//! ComfyUI WebSocket frame normalization.
//!
//! ComfyUI sends JSON frames shaped `{"type": "<kind>", "data": {...}}`,
//! but the payload details vary between server versions. Rather than a
//! strict deserialization, frames are probed defensively and collapsed
//! into the small set of [`PushEvent`]s the progress engine cares about.
//! Frames of any other type are ignored.

use serde_json::Value;

/// A normalized push-channel event.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// Step-level progress, usually from a sampler node.
    Progress {
        prompt_id: Option<String>,
        node: Option<String>,
        value: f64,
        max: f64,
    },

    /// A node finished and produced output descriptors.
    OutputReady {
        prompt_id: Option<String>,
        output: Value,
    },

    /// All nodes are done (`executing` with `node: null`).
    NodesDone { prompt_id: Option<String> },
}

/// Known locations of the prompt id inside a push frame.
///
/// The canonical shape is undocumented upstream; this list collects every
/// variant observed in the wild. Treat it as an allow-list to extend when
/// a new server version moves the field — never as a guess to prune.
const PROMPT_ID_PATHS: [&[&str]; 11] = [
    &["prompt_id"],
    &["promptId"],
    &["data", "prompt_id"],
    &["data", "promptId"],
    &["data", "prompt", "id"],
    &["data", "prompt", "prompt_id"],
    &["data", "prompt", "promptId"],
    &["data", "extra_data", "prompt_id"],
    &["data", "extra_data", "promptId"],
    &["data", "metadata", "prompt_id"],
    &["data", "metadata", "promptId"],
];

/// Resolve the prompt id of a push frame, trying each known location in
/// order. First non-null string wins.
pub fn resolve_prompt_id(frame: &Value) -> Option<String> {
    PROMPT_ID_PATHS.iter().find_map(|path| {
        let mut cursor = frame;
        for key in *path {
            cursor = cursor.get(key)?;
        }
        cursor.as_str().map(|s| s.to_string())
    })
}

/// Normalize a parsed push frame into a [`PushEvent`].
///
/// Returns `None` for frame types the progress engine does not consume
/// (`status`, `execution_start`, `execution_cached`, binary previews have
/// already been filtered out by the caller, unknown types).
pub fn normalize_frame(frame: &Value) -> Option<PushEvent> {
    let kind = frame.get("type")?.as_str()?;
    let prompt_id = resolve_prompt_id(frame);

    match kind {
        "progress_state" | "progress" => {
            let data = frame.get("data")?;
            let node = data
                .get("node")
                .and_then(|n| n.as_str())
                .map(|n| n.to_string());
            Some(PushEvent::Progress {
                prompt_id,
                node,
                value: number_or_zero(data.get("value")),
                max: number_or_zero(data.get("max")),
            })
        }
        "executed" => {
            let output = frame.get("data")?.get("output")?.clone();
            Some(PushEvent::OutputReady { prompt_id, output })
        }
        "executing" => {
            let data = frame.get("data")?;
            if data.get("node").is_some_and(|n| n.is_null()) {
                Some(PushEvent::NodesDone { prompt_id })
            } else {
                None
            }
        }
        _ => None,
    }
}

fn number_or_zero(value: Option<&Value>) -> f64 {
    value.and_then(|v| v.as_f64()).unwrap_or(0.0)
}
