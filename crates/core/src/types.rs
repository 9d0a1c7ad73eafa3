/// Identifier of a queued generation job.
///
/// Assigned by the ComfyUI server when it returns one, otherwise generated
/// locally (UUID v4). Opaque; used only as a join key across the per-job
/// state maps.
pub type PromptId = String;
