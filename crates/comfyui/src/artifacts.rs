//! Local persistence of finished artifacts.
//!
//! Once a job's output is resolved, its bytes are fetched from the
//! ComfyUI server and written next to the capture's input frame so the
//! gallery (and the last-resort fallback URL) survive the server pruning
//! its own output directory.

use std::path::{Path, PathBuf};

/// Writes finished artifacts into the gallery output directory, one
/// `<capture_id>.png` per job.
pub struct ArtifactStore {
    output_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File name of a capture's saved artifact.
    pub fn file_name(capture_id: &str) -> String {
        format!("{capture_id}.png")
    }

    /// Whether a saved copy exists for this capture.
    pub fn exists(&self, capture_id: &str) -> bool {
        self.output_dir.join(Self::file_name(capture_id)).is_file()
    }

    /// Persist artifact bytes for a capture.
    pub async fn persist(&self, capture_id: &str, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(Self::file_name(capture_id));
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(capture_id, path = %path.display(), "Saved generated artifact");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persist_then_exists() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path().join("output"));

        assert!(!store.exists("cap-1"));
        store.persist("cap-1", b"PNG").await.unwrap();
        assert!(store.exists("cap-1"));

        let saved = std::fs::read(store.output_dir().join("cap-1.png")).unwrap();
        assert_eq!(saved, b"PNG");
    }
}
