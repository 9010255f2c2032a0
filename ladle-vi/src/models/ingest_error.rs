//! Fixed error taxonomy for pipeline runs
//!
//! One code per failure class, each with a static base message plus
//! optional contextual detail. Download, audio-extraction, and
//! transcription failures are fatal to a run; OCR and LLM failures
//! degrade instead of aborting.

use serde::{Deserialize, Serialize};

/// Error taxonomy codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    VideoUnavailable,
    DownloadFailed,
    AudioExtractionFailed,
    AsrFailed,
    OcrFailed,
    FrameExtractionFailed,
    LlmFailed,
    ValidationFailed,
    PersistFailed,
    UnknownError,
}

impl ErrorCode {
    /// String form matching the serialized representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::VideoUnavailable => "VIDEO_UNAVAILABLE",
            ErrorCode::DownloadFailed => "DOWNLOAD_FAILED",
            ErrorCode::AudioExtractionFailed => "AUDIO_EXTRACTION_FAILED",
            ErrorCode::AsrFailed => "ASR_FAILED",
            ErrorCode::OcrFailed => "OCR_FAILED",
            ErrorCode::FrameExtractionFailed => "FRAME_EXTRACTION_FAILED",
            ErrorCode::LlmFailed => "LLM_FAILED",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::PersistFailed => "PERSIST_FAILED",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Static message attached to every error of this class
    pub fn base_message(&self) -> &'static str {
        match self {
            ErrorCode::VideoUnavailable => "The video is private, removed, or cannot be accessed",
            ErrorCode::DownloadFailed => "Failed to download the video",
            ErrorCode::AudioExtractionFailed => "Failed to extract audio from the video",
            ErrorCode::AsrFailed => "Speech-to-text transcription failed",
            ErrorCode::OcrFailed => "On-screen text recognition failed",
            ErrorCode::FrameExtractionFailed => "Failed to sample frames from the video",
            ErrorCode::LlmFailed => "The language model request failed",
            ErrorCode::ValidationFailed => "The structured recipe failed validation",
            ErrorCode::PersistFailed => "Failed to save the recipe",
            ErrorCode::UnknownError => "An unexpected error occurred",
        }
    }

    /// Fatal codes abort the run; the rest degrade and continue
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorCode::VideoUnavailable
                | ErrorCode::DownloadFailed
                | ErrorCode::AudioExtractionFailed
                | ErrorCode::AsrFailed
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified pipeline error: taxonomy code plus optional detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestError {
    pub code: ErrorCode,
    pub detail: Option<String>,
}

impl IngestError {
    pub fn new(code: ErrorCode) -> Self {
        Self { code, detail: None }
    }

    pub fn with_detail(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: Some(detail.into()),
        }
    }

    /// Base message plus detail when present
    pub fn full_message(&self) -> String {
        match &self.detail {
            Some(detail) if !detail.is_empty() => {
                format!("{}: {}", self.code.base_message(), detail)
            }
            _ => self.code.base_message().to_string(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.code.is_fatal()
    }
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.full_message())
    }
}

impl std::error::Error for IngestError {}
