//! Workflow style library.
//!
//! A "style" is a ComfyUI workflow definition stored as `<style>.json` in
//! the workflow directory. The library lists the selectable styles, loads a
//! definition with a `default.json` fallback, and rewrites a loaded
//! definition for a specific capture (prompt text and input/output image
//! overrides) before submission.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::CoreError;

/// Multiline-text node class tags eligible for a prompt override, after
/// lowercasing and stripping whitespace. An allow-list: extend it when a
/// workflow uses a new text-node spelling, do not loosen the match.
const PROMPT_NODE_CLASSES: [&str; 3] = [
    "textmultiline",
    "textmultilinewidget",
    "textmultilineprompt",
];

/// Loads workflow definitions from a directory of JSON files.
pub struct WorkflowLibrary {
    dir: PathBuf,
}

impl WorkflowLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the styles are loaded from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List selectable style names, sorted.
    ///
    /// Internal definitions (names starting with `default` or containing
    /// `_save`) are hidden from the kiosk UI.
    pub fn list_styles(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut styles: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    return None;
                }
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_string())
            })
            .filter(|name| !name.starts_with("default") && !name.contains("_save"))
            .collect();
        styles.sort();
        styles
    }

    /// Load the workflow definition for a style.
    ///
    /// Falls back to `default.json` when the named style does not exist.
    /// Fails with [`CoreError::NotFound`] if neither file is present.
    pub fn load(&self, style: &str) -> Result<Value, CoreError> {
        let named = self.dir.join(format!("{style}.json"));
        let fallback = self.dir.join("default.json");
        let candidate = if named.is_file() { named } else { fallback };

        if !candidate.is_file() {
            return Err(CoreError::NotFound {
                entity: "Workflow",
                name: style.to_string(),
            });
        }

        let raw = std::fs::read_to_string(&candidate)
            .map_err(|e| CoreError::Internal(format!("Failed to read workflow: {e}")))?;
        serde_json::from_str(&raw)
            .map_err(|e| CoreError::Internal(format!("Malformed workflow JSON: {e}")))
    }
}

/// Normalize a node class tag for override matching: lowercase, strip all
/// whitespace.
fn normalize_class(class_type: &str) -> String {
    class_type
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Rewrite the `text` input of every multiline-text node with the given
/// prompt. Nodes whose class tag is not in the allow-list are untouched.
pub fn apply_prompt_override(workflow: &mut Value, prompt: &str) {
    let Some(nodes) = workflow.as_object_mut() else {
        return;
    };
    for node in nodes.values_mut() {
        let class = node
            .get("class_type")
            .and_then(|c| c.as_str())
            .map(normalize_class)
            .unwrap_or_default();
        if !PROMPT_NODE_CLASSES.contains(&class.as_str()) {
            continue;
        }
        if let Some(inputs) = ensure_inputs(node) {
            inputs.insert("text".to_string(), Value::String(prompt.to_string()));
        }
    }
}

/// Point every load-image node at `image_name` and prefix every save-image
/// node's output files with `output_prefix`.
pub fn apply_image_override(workflow: &mut Value, image_name: &str, output_prefix: &str) {
    let Some(nodes) = workflow.as_object_mut() else {
        return;
    };
    for node in nodes.values_mut() {
        let class = node
            .get("class_type")
            .and_then(|c| c.as_str())
            .map(normalize_class)
            .unwrap_or_default();
        if class.contains("loadimage") {
            if let Some(inputs) = ensure_inputs(node) {
                inputs.insert("image".to_string(), Value::String(image_name.to_string()));
            }
        } else if class.contains("saveimage") {
            if let Some(inputs) = ensure_inputs(node) {
                inputs.insert(
                    "filename_prefix".to_string(),
                    Value::String(output_prefix.to_string()),
                );
            }
        }
    }
}

/// Get the node's `inputs` object, creating it when absent.
fn ensure_inputs(node: &mut Value) -> Option<&mut serde_json::Map<String, Value>> {
    let obj = node.as_object_mut()?;
    if !obj.get("inputs").is_some_and(|i| i.is_object()) {
        obj.insert("inputs".to_string(), Value::Object(Default::default()));
    }
    obj.get_mut("inputs").and_then(|i| i.as_object_mut())
}
