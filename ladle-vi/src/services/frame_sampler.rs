//! Frame sampling adapter
//!
//! Wraps ffmpeg to sample still frames from a video, either at scene
//! changes (ffmpeg `select` filter with `showinfo` timestamps) or at a
//! fixed rate. Returns frames in order with their timestamps so OCR
//! output can be grouped per frame.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

static PTS_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"pts_time:([0-9.]+)").unwrap());

/// Frame sampling errors
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How to pick frames out of the video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplingMethod {
    /// Frames where ffmpeg's scene-change score exceeds a threshold.
    SceneChange,
    /// Fixed frames-per-second sampling.
    FixedRate { fps: f64 },
}

/// A sampled frame and where in the video it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledFrame {
    pub path: PathBuf,
    pub timestamp_seconds: f64,
}

/// Samples frames from a local video file into a directory.
#[async_trait]
pub trait FrameSampler: Send + Sync {
    async fn sample(
        &self,
        video_path: &Path,
        frames_dir: &Path,
        method: SamplingMethod,
        max_frames: u32,
    ) -> Result<Vec<SampledFrame>, SampleError>;
}

/// ffmpeg backed sampler
pub struct FfmpegFrameSampler {
    ffmpeg_path: String,
    scene_threshold: f64,
}

impl FfmpegFrameSampler {
    pub fn new(ffmpeg_path: impl Into<String>, scene_threshold: f64) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            scene_threshold,
        }
    }

    async fn run_ffmpeg(
        &self,
        video_path: &Path,
        frames_dir: &Path,
        method: SamplingMethod,
        max_frames: u32,
    ) -> Result<String, SampleError> {
        let pattern = frames_dir.join("frame_%05d.jpg");
        let filter = match method {
            SamplingMethod::SceneChange => {
                format!("select='gt(scene,{})',showinfo", self.scene_threshold)
            }
            SamplingMethod::FixedRate { fps } => format!("fps={}", fps),
        };

        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-i").arg(video_path).arg("-vf").arg(&filter);
        if matches!(method, SamplingMethod::SceneChange) {
            cmd.arg("-vsync").arg("vfr");
        }
        cmd.arg("-vframes")
            .arg(max_frames.to_string())
            .arg(pattern)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("info")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cmd
            .output()
            .await
            .map_err(|e| SampleError::FfmpegFailed(format!("failed to execute ffmpeg: {}", e)))?;

        // showinfo logs to stderr even on success
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(SampleError::FfmpegFailed(stderr.trim().to_string()));
        }
        Ok(stderr)
    }
}

#[async_trait]
impl FrameSampler for FfmpegFrameSampler {
    async fn sample(
        &self,
        video_path: &Path,
        frames_dir: &Path,
        method: SamplingMethod,
        max_frames: u32,
    ) -> Result<Vec<SampledFrame>, SampleError> {
        tokio::fs::create_dir_all(frames_dir).await?;

        let stderr = self
            .run_ffmpeg(video_path, frames_dir, method, max_frames)
            .await?;

        let frame_paths = list_frame_files(frames_dir)?;
        let timestamps = match method {
            SamplingMethod::SceneChange => parse_showinfo_timestamps(&stderr),
            SamplingMethod::FixedRate { fps } => {
                (0..frame_paths.len()).map(|i| i as f64 / fps).collect()
            }
        };

        let frames: Vec<SampledFrame> = frame_paths
            .into_iter()
            .zip(timestamps)
            .map(|(path, timestamp_seconds)| SampledFrame {
                path,
                timestamp_seconds,
            })
            .collect();

        debug!(
            video = %video_path.display(),
            method = ?method,
            frame_count = frames.len(),
            "Frames sampled"
        );

        Ok(frames)
    }
}

/// Pull frame timestamps out of ffmpeg's `showinfo` stderr lines.
pub fn parse_showinfo_timestamps(stderr: &str) -> Vec<f64> {
    stderr
        .lines()
        .filter(|line| line.contains("showinfo") && line.contains("pts_time"))
        .filter_map(|line| {
            PTS_TIME
                .captures(line)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
        })
        .collect()
}

fn list_frame_files(frames_dir: &Path) -> Result<Vec<PathBuf>, SampleError> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(frames_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("frame_") && n.ends_with(".jpg"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pts_time_from_showinfo_lines() {
        let stderr = "\
[Parsed_showinfo_1 @ 0x55] n:   0 pts:  12345 pts_time:0.4333 duration:   512\n\
[Parsed_showinfo_1 @ 0x55] n:   1 pts:  67890 pts_time:2.2667 duration:   512\n\
frame=    2 fps=0.0 q=3.2 size=N/A\n";
        let timestamps = parse_showinfo_timestamps(stderr);
        assert_eq!(timestamps, vec![0.4333, 2.2667]);
    }

    #[test]
    fn ignores_lines_without_pts_time() {
        let stderr = "[mjpeg @ 0x55] some warning\nframe=    1 fps=0.0\n";
        assert!(parse_showinfo_timestamps(stderr).is_empty());
    }

    #[test]
    fn lists_frames_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["frame_00002.jpg", "frame_00001.jpg", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let paths = list_frame_files(dir.path()).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["frame_00001.jpg", "frame_00002.jpg"]);
    }
}
