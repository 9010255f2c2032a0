//! Fake tool adapters for pipeline tests
//!
//! Deterministic stand-ins for yt-dlp, ffmpeg, the ASR service, and the
//! OCR engine. Each fake carries a call counter so tests can assert
//! which stages actually ran (or were skipped).

use async_trait::async_trait;
use ladle_vi::services::{
    AudioError, AudioExtractor, FetchError, FetchedVideo, FrameOcr, FrameSampler, OcrError,
    OcrLine, SampleError, SampledFrame, SamplingMethod, TextRecognizer, TranscribeError,
    Transcriber, VideoFetcher,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Returns fixed video metadata without touching the network.
#[derive(Default)]
pub struct FakeFetcher {
    pub title: Option<String>,
    pub description: Option<String>,
    pub uploader: Option<String>,
    pub thumbnail_url: Option<String>,
    pub unavailable: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl VideoFetcher for FakeFetcher {
    async fn fetch(&self, _url: &str, dest_dir: &Path) -> Result<FetchedVideo, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(FetchError::Unavailable);
        }
        Ok(FetchedVideo {
            video_path: dest_dir.join("video.mp4"),
            title: self.title.clone(),
            description: self.description.clone(),
            uploader: self.uploader.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
        })
    }
}

/// Pretends the audio track was extracted.
#[derive(Default)]
pub struct FakeAudioExtractor {
    pub calls: AtomicUsize,
}

#[async_trait]
impl AudioExtractor for FakeAudioExtractor {
    async fn extract(&self, _video_path: &Path, audio_path: &Path) -> Result<PathBuf, AudioError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(audio_path.to_path_buf())
    }
}

/// Returns a fixed transcript, failing the first `fail_first` calls.
#[derive(Default)]
pub struct FakeTranscriber {
    pub transcript: String,
    pub fail_first: usize,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio_path: &Path) -> Result<String, TranscribeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(TranscribeError::RequestFailed(
                "induced transcription failure".to_string(),
            ));
        }
        Ok(self.transcript.clone())
    }
}

/// Yields one synthetic frame per configured timestamp.
#[derive(Default)]
pub struct FakeFrameSampler {
    pub timestamps: Vec<f64>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl FrameSampler for FakeFrameSampler {
    async fn sample(
        &self,
        _video_path: &Path,
        frames_dir: &Path,
        _method: SamplingMethod,
        max_frames: u32,
    ) -> Result<Vec<SampledFrame>, SampleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SampleError::FfmpegFailed(
                "induced sampler failure".to_string(),
            ));
        }
        Ok(self
            .timestamps
            .iter()
            .take(max_frames as usize)
            .enumerate()
            .map(|(i, &ts)| SampledFrame {
                path: frames_dir.join(format!("frame_{:04}.png", i + 1)),
                timestamp_seconds: ts,
            })
            .collect())
    }
}

/// Recognizes the configured text lines, one per sampled frame.
#[derive(Default)]
pub struct FakeTextRecognizer {
    pub texts: Vec<String>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl TextRecognizer for FakeTextRecognizer {
    async fn recognize(&self, frames: &[SampledFrame]) -> Result<Vec<FrameOcr>, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(OcrError::EngineFailed("induced OCR failure".to_string()));
        }
        Ok(frames
            .iter()
            .zip(self.texts.iter())
            .map(|(frame, text)| FrameOcr {
                timestamp_seconds: frame.timestamp_seconds,
                lines: vec![OcrLine {
                    text: text.clone(),
                    confidence: 0.92,
                    bbox: None,
                }],
            })
            .collect())
    }
}
