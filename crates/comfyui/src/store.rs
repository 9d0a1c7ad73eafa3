//! Shared per-job progress state.
//!
//! [`JobStore`] is the single owner of everything the booth knows about
//! in-flight jobs: push-derived progress, resolved outputs, step-weight
//! tables, capture pairings, and completion markers. The push-channel
//! ingestor is the sole writer of socket state; the reconciliation engine
//! reads it and owns the completion/saved markers. Both receive the same
//! store instance — there is no ambient global state.
//!
//! Entries are scoped to the process lifetime. Stale socket-progress
//! entries are ignored rather than reaped; prompt ids are never reused,
//! so the maps only grow by a few small entries per capture.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use snapbooth_core::types::PromptId;

use crate::outputs::OutputImage;
use crate::steps::StepTable;

/// How long a push-derived progress entry outranks polling.
pub const SOCKET_FRESHNESS: Duration = Duration::from_secs(10);

/// Push-derived progress for one prompt.
#[derive(Debug, Clone)]
pub struct SocketProgress {
    /// Percent in `[0, 100]`.
    pub percent: f64,
    pub complete: bool,
    pub updated_at: Instant,
}

impl SocketProgress {
    /// Whether this entry is recent enough to outrank a polled value.
    pub fn is_fresh(&self) -> bool {
        self.updated_at.elapsed() < SOCKET_FRESHNESS
    }
}

#[derive(Default)]
struct Inner {
    socket_progress: HashMap<PromptId, SocketProgress>,
    outputs: HashMap<PromptId, OutputImage>,
    step_tables: HashMap<PromptId, StepTable>,
    captures: HashMap<PromptId, String>,
    saved: HashSet<PromptId>,
    completed: HashSet<PromptId>,
    last_prompt_id: Option<PromptId>,
}

/// Process-wide job state, shared between the ingestor, the
/// reconciliation engine, and the HTTP handlers.
#[derive(Default)]
pub struct JobStore {
    inner: RwLock<Inner>,
    channel_ready: AtomicBool,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly submitted job.
    ///
    /// Stores the step-weight table and capture pairing, and records the
    /// prompt id as the most recent submission (the fallback for push
    /// frames that omit their id).
    pub async fn register_job(&self, prompt_id: &PromptId, capture_id: &str, table: StepTable) {
        let mut inner = self.inner.write().await;
        inner.step_tables.insert(prompt_id.clone(), table);
        inner
            .captures
            .insert(prompt_id.clone(), capture_id.to_string());
        inner.last_prompt_id = Some(prompt_id.clone());
    }

    /// The most recently submitted prompt id, if any.
    pub async fn last_prompt_id(&self) -> Option<PromptId> {
        self.inner.read().await.last_prompt_id.clone()
    }

    /// Overwrite the push-derived progress for a prompt.
    ///
    /// The percent is clamped to `[0, 100]`. A previously observed
    /// `complete` flag is never un-set by a later event.
    pub async fn record_socket_progress(&self, prompt_id: &PromptId, percent: f64, complete: bool) {
        let mut inner = self.inner.write().await;
        let complete = complete
            || inner
                .socket_progress
                .get(prompt_id)
                .is_some_and(|p| p.complete);
        inner.socket_progress.insert(
            prompt_id.clone(),
            SocketProgress {
                percent: percent.clamp(0.0, 100.0),
                complete,
                updated_at: Instant::now(),
            },
        );
    }

    /// Latest push-derived progress for a prompt.
    pub async fn socket_progress(&self, prompt_id: &PromptId) -> Option<SocketProgress> {
        self.inner.read().await.socket_progress.get(prompt_id).cloned()
    }

    /// Feed a per-node progress observation through the job's step table.
    ///
    /// Returns the new aggregate percent, or `None` when the job has no
    /// table, the node is unweighted, or the table is empty — callers
    /// fall back to the raw ratio.
    pub async fn apply_node_progress(
        &self,
        prompt_id: &PromptId,
        node_id: &str,
        value: f64,
        max: f64,
    ) -> Option<f64> {
        let mut inner = self.inner.write().await;
        let table = inner.step_tables.get_mut(prompt_id)?;
        table.record(node_id, value, max)
    }

    /// Record the resolved output for a prompt. First write wins.
    pub async fn record_output(&self, prompt_id: &PromptId, image: OutputImage) {
        let mut inner = self.inner.write().await;
        inner.outputs.entry(prompt_id.clone()).or_insert(image);
    }

    /// The resolved output for a prompt, if discovered yet.
    pub async fn output(&self, prompt_id: &PromptId) -> Option<OutputImage> {
        self.inner.read().await.outputs.get(prompt_id).cloned()
    }

    /// The capture paired with a prompt at submission time.
    pub async fn capture_id(&self, prompt_id: &PromptId) -> Option<String> {
        self.inner.read().await.captures.get(prompt_id).cloned()
    }

    /// Mark a job complete. Sticky: once set it is never cleared.
    ///
    /// Drops the job's step table — no further weighting is needed.
    /// Returns `true` when the job was not already marked.
    pub async fn mark_complete(&self, prompt_id: &PromptId) -> bool {
        let mut inner = self.inner.write().await;
        let newly = inner.completed.insert(prompt_id.clone());
        if newly {
            inner.step_tables.remove(prompt_id);
        }
        newly
    }

    /// Whether a job has ever been observed complete.
    pub async fn is_complete(&self, prompt_id: &PromptId) -> bool {
        self.inner.read().await.completed.contains(prompt_id)
    }

    /// Record that the job's artifact was persisted locally. Returns
    /// `true` the first time.
    pub async fn mark_saved(&self, prompt_id: &PromptId) -> bool {
        self.inner.write().await.saved.insert(prompt_id.clone())
    }

    /// Whether the job's artifact was already persisted locally.
    pub async fn is_saved(&self, prompt_id: &PromptId) -> bool {
        self.inner.read().await.saved.contains(prompt_id)
    }

    /// Whether the push channel is currently connected.
    pub fn channel_ready(&self) -> bool {
        self.channel_ready.load(Ordering::Relaxed)
    }

    pub fn set_channel_ready(&self, ready: bool) {
        self.channel_ready.store(ready, Ordering::Relaxed);
    }
}
