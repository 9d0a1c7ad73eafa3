//! Webcam capture handling.
//!
//! A capture is the single webcam frame the kiosk posts as a base64 data
//! URL. Each capture gets a filesystem-safe identifier used to pair the
//! input frame with the generated output in the gallery.

use base64::Engine;

use crate::error::CoreError;

/// Generate a unique capture identifier.
///
/// Format: `capture-<unix-millis>-<uuid4>`, restricted to characters safe
/// for filenames on every platform the kiosk runs on.
pub fn new_capture_id() -> String {
    let id = format!(
        "capture-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4()
    );
    safe_file_name(&id)
}

/// Replace any character outside `[A-Za-z0-9-_]` with an underscore.
pub fn safe_file_name(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Decode a `data:image/<fmt>;base64,<payload>` data URL into raw bytes.
///
/// Rejects anything that is not a base64 image data URL with
/// [`CoreError::Validation`]. Validation happens before the frame is
/// written anywhere or any network call is made.
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>, CoreError> {
    let rest = data_url
        .strip_prefix("data:image/")
        .ok_or_else(|| CoreError::Validation("Invalid image data".into()))?;

    let (format, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| CoreError::Validation("Invalid image data".into()))?;

    if format.is_empty() || !format.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CoreError::Validation("Invalid image data".into()));
    }
    if payload.is_empty() {
        return Err(CoreError::Validation("Invalid image data".into()));
    }

    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| CoreError::Validation("Invalid image data".into()))
}
