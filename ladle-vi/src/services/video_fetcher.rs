//! Video download adapter
//!
//! Wraps the yt-dlp command-line tool. A single invocation downloads the
//! video into the run's working directory and prints the source metadata
//! (title, description, uploader, thumbnail) as JSON on stdout.
//!
//! Private and removed videos are reported as [`FetchError::Unavailable`]
//! so the pipeline can attach the right error code; every other failure is
//! the generic [`FetchError::Failed`].

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Video fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Video is private or not found")]
    Unavailable,

    #[error("yt-dlp failed: {0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A downloaded video plus whatever source metadata the downloader reported.
///
/// All metadata fields are optional; a download with no parseable metadata
/// is still a successful download.
#[derive(Debug, Clone)]
pub struct FetchedVideo {
    pub video_path: PathBuf,
    pub title: Option<String>,
    pub description: Option<String>,
    pub uploader: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl FetchedVideo {
    fn bare(video_path: PathBuf) -> Self {
        Self {
            video_path,
            title: None,
            description: None,
            uploader: None,
            thumbnail_url: None,
        }
    }
}

/// Downloads a source video into a local directory.
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    /// Download `url` and place the media file under `dest_dir`.
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<FetchedVideo, FetchError>;
}

/// yt-dlp backed fetcher
pub struct YtDlpFetcher {
    yt_dlp_path: String,
}

impl YtDlpFetcher {
    pub fn new(yt_dlp_path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
        }
    }
}

#[async_trait]
impl VideoFetcher for YtDlpFetcher {
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<FetchedVideo, FetchError> {
        let output_path = dest_dir.join("video.mp4");

        // --print-json emits the info dict on stdout while still downloading
        let output = Command::new(&self.yt_dlp_path)
            .arg("-f")
            .arg("mp4")
            .arg("-o")
            .arg(&output_path)
            .arg("--print-json")
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| FetchError::Failed(format!("failed to execute yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr));
        }

        if !output_path.exists() {
            return Err(FetchError::Failed(
                "video not downloaded (file missing)".to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let fetched = metadata_from_json(&stdout, output_path);

        debug!(
            url = url,
            title = ?fetched.title,
            uploader = ?fetched.uploader,
            "Video downloaded"
        );

        Ok(fetched)
    }
}

/// Classify a failed yt-dlp run from its stderr.
///
/// Private and 404 responses map to the distinguishable unavailable error;
/// anything else carries the stderr text as detail.
pub fn classify_failure(stderr: &str) -> FetchError {
    if stderr.contains("This video is private") || stderr.contains("HTTP Error 404") {
        FetchError::Unavailable
    } else {
        FetchError::Failed(stderr.trim().to_string())
    }
}

/// Pull the metadata fields out of yt-dlp's info JSON.
///
/// Metadata is best-effort: a malformed info dict degrades to a bare
/// download rather than failing the fetch.
pub fn metadata_from_json(stdout: &str, video_path: PathBuf) -> FetchedVideo {
    let info: serde_json::Value = match serde_json::from_str(stdout.trim()) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Could not parse yt-dlp metadata, continuing without it");
            return FetchedVideo::bare(video_path);
        }
    };

    let string_field = |key: &str| {
        info.get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty())
    };

    FetchedVideo {
        video_path,
        title: string_field("title"),
        description: string_field("description"),
        uploader: string_field("uploader"),
        thumbnail_url: string_field("thumbnail"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_video_is_unavailable() {
        let err = classify_failure("ERROR: This video is private");
        assert!(matches!(err, FetchError::Unavailable));
    }

    #[test]
    fn http_404_is_unavailable() {
        let err = classify_failure("ERROR: unable to download: HTTP Error 404: Not Found");
        assert!(matches!(err, FetchError::Unavailable));
    }

    #[test]
    fn other_stderr_is_generic_failure() {
        let err = classify_failure("Some other error\n");
        match err {
            FetchError::Failed(detail) => assert_eq!(detail, "Some other error"),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn metadata_parsed_from_info_json() {
        let json = r#"{
            "title": "Easy Chicken Stir Fry",
            "description": "1 lb chicken, 2 tbsp soy sauce #recipe",
            "uploader": "cookwithme",
            "thumbnail": "https://example.com/thumb.jpg"
        }"#;
        let fetched = metadata_from_json(json, PathBuf::from("/tmp/video.mp4"));
        assert_eq!(fetched.title.as_deref(), Some("Easy Chicken Stir Fry"));
        assert_eq!(fetched.uploader.as_deref(), Some("cookwithme"));
        assert_eq!(
            fetched.thumbnail_url.as_deref(),
            Some("https://example.com/thumb.jpg")
        );
    }

    #[test]
    fn malformed_metadata_degrades_to_bare_download() {
        let fetched = metadata_from_json("not json at all", PathBuf::from("/tmp/video.mp4"));
        assert_eq!(fetched.video_path, PathBuf::from("/tmp/video.mp4"));
        assert!(fetched.title.is_none());
        assert!(fetched.thumbnail_url.is_none());
    }

    #[test]
    fn empty_metadata_fields_become_none() {
        let json = r#"{"title": "", "uploader": "someone"}"#;
        let fetched = metadata_from_json(json, PathBuf::from("/tmp/video.mp4"));
        assert!(fetched.title.is_none());
        assert_eq!(fetched.uploader.as_deref(), Some("someone"));
    }
}
