//! Audio extraction adapter
//!
//! Wraps ffmpeg to pull the audio track out of a downloaded video as a
//! 16 kHz mono WAV, the input format the transcription API expects.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Audio extraction errors
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    #[error("audio not extracted (file missing)")]
    MissingOutput,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extracts the audio track from a local video file.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Write the audio track of `video_path` to `audio_path`.
    async fn extract(&self, video_path: &Path, audio_path: &Path) -> Result<PathBuf, AudioError>;
}

/// ffmpeg backed extractor producing 16 kHz mono WAV
pub struct FfmpegAudioExtractor {
    ffmpeg_path: String,
}

impl FfmpegAudioExtractor {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

#[async_trait]
impl AudioExtractor for FfmpegAudioExtractor {
    async fn extract(&self, video_path: &Path, audio_path: &Path) -> Result<PathBuf, AudioError> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(video_path)
            .arg("-ac")
            .arg("1")
            .arg("-ar")
            .arg("16000")
            .arg(audio_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| AudioError::FfmpegFailed(format!("failed to execute ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AudioError::FfmpegFailed(stderr.trim().to_string()));
        }

        if !audio_path.exists() {
            return Err(AudioError::MissingOutput);
        }

        debug!(
            video = %video_path.display(),
            audio = %audio_path.display(),
            "Audio track extracted"
        );

        Ok(audio_path.to_path_buf())
    }
}
