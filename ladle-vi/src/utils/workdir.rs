//! Per-job working directory with cleanup on drop
//!
//! Each pipeline run gets its own directory under `<root>/work/<job_id>/`
//! for the downloaded video, extracted audio, and sampled frames. The
//! directory is removed when the guard drops, whether the run succeeded
//! or bailed out mid-stage.

use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Scratch directory for one pipeline run, removed on drop
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
}

impl WorkDir {
    /// Create `<work_root>/<job_id>/`, including parents
    pub fn create(work_root: &Path, job_id: Uuid) -> std::io::Result<Self> {
        let path = work_root.join(job_id.to_string());
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the downloaded video file
    pub fn video_path(&self) -> PathBuf {
        self.path.join("video.mp4")
    }

    /// Path of the extracted audio track
    pub fn audio_path(&self) -> PathBuf {
        self.path.join("audio.wav")
    }

    /// Directory for sampled video frames
    pub fn frames_dir(&self) -> PathBuf {
        self.path.join("frames")
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            // Not fatal; a leftover scratch directory only wastes disk
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove job working directory"
            );
        }
    }
}
