//! Speech-to-text adapter
//!
//! Sends extracted audio to an OpenAI-compatible transcription endpoint.
//! Rate-limit responses are retried with exponential backoff (at most
//! [`MAX_RATE_LIMIT_RETRIES`] retries); any other API error fails
//! immediately. The input audio file is deleted exactly once after the
//! attempt loop, on success and failure alike, so a failed run never
//! leaves audio behind in the working directory.

use async_trait::async_trait;
use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Maximum retries after a rate-limit response before giving up.
pub const MAX_RATE_LIMIT_RETRIES: u32 = 2;

/// Base delay for rate-limit backoff; doubles on each retry.
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(2);

/// Transcription errors
#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("rate limited by transcription API")]
    RateLimited,

    #[error("Rate limit exceeded after retries")]
    RetriesExhausted,

    #[error("transcription request failed: {0}")]
    RequestFailed(String),

    #[error("transcription API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns an audio file into transcript text.
///
/// Implementations own the input file once called: it is deleted whether
/// or not transcription succeeds.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscribeError>;
}

/// Run `attempt_fn` with rate-limit backoff, then delete the audio file.
///
/// Only [`TranscribeError::RateLimited`] is retried; after `max_retries`
/// rate-limit hits the loop gives up with `RetriesExhausted`. The delay
/// doubles per retry starting from `backoff_base`. The file removal runs
/// exactly once, after the loop, regardless of outcome.
pub async fn transcribe_with_retry<F, Fut>(
    audio_path: &Path,
    max_retries: u32,
    backoff_base: Duration,
    mut attempt_fn: F,
) -> Result<String, TranscribeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, TranscribeError>>,
{
    let mut rate_limit_hits = 0u32;
    let result = loop {
        match attempt_fn().await {
            Ok(text) => break Ok(text),
            Err(TranscribeError::RateLimited) => {
                rate_limit_hits += 1;
                if rate_limit_hits > max_retries {
                    break Err(TranscribeError::RetriesExhausted);
                }
                let delay = backoff_base * 2u32.pow(rate_limit_hits - 1);
                warn!(
                    attempt = rate_limit_hits,
                    delay_ms = delay.as_millis() as u64,
                    "Transcription rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => break Err(e),
        }
    };

    remove_input_audio(audio_path).await;
    result
}

/// Best-effort removal of the input audio. Already-gone files are fine;
/// other removal failures are logged and swallowed so they never mask
/// the transcription result.
async fn remove_input_audio(audio_path: &Path) {
    match tokio::fs::remove_file(audio_path).await {
        Ok(()) => debug!(audio = %audio_path.display(), "Input audio deleted"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(
            audio = %audio_path.display(),
            error = %e,
            "Could not delete input audio"
        ),
    }
}

/// Whisper-style HTTP transcriber
pub struct WhisperTranscriber {
    endpoint: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl WhisperTranscriber {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn request_once(&self, audio_path: &Path) -> Result<String, TranscribeError> {
        let bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|e| TranscribeError::RequestFailed(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "text");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscribeError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(TranscribeError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TranscribeError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| TranscribeError::RequestFailed(e.to_string()))?;
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscribeError> {
        transcribe_with_retry(audio_path, MAX_RATE_LIMIT_RETRIES, RATE_LIMIT_BACKOFF, || {
            self.request_once(audio_path)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn write_audio_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("audio.wav");
        std::fs::write(&path, b"RIFF").unwrap();
        path
    }

    #[tokio::test]
    async fn retries_rate_limits_then_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_audio_file(&dir);
        let calls = Arc::new(AtomicU32::new(0));

        let calls_in = calls.clone();
        let result = transcribe_with_retry(&audio, 2, Duration::from_millis(1), move || {
            let calls = calls_in.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= 2 {
                    Err(TranscribeError::RateLimited)
                } else {
                    Ok("add the garlic and stir".to_string())
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "add the garlic and stir");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!audio.exists(), "audio must be deleted after success");
    }

    #[tokio::test]
    async fn gives_up_after_max_rate_limit_retries() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_audio_file(&dir);
        let calls = Arc::new(AtomicU32::new(0));

        let calls_in = calls.clone();
        let result = transcribe_with_retry(&audio, 2, Duration::from_millis(1), move || {
            let calls = calls_in.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TranscribeError::RateLimited)
            }
        })
        .await;

        assert!(matches!(result, Err(TranscribeError::RetriesExhausted)));
        // Initial attempt plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!audio.exists(), "audio must be deleted after failure");
    }

    #[tokio::test]
    async fn non_rate_limit_error_fails_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_audio_file(&dir);
        let calls = Arc::new(AtomicU32::new(0));

        let calls_in = calls.clone();
        let result = transcribe_with_retry(&audio, 2, Duration::from_millis(1), move || {
            let calls = calls_in.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TranscribeError::ApiError {
                    status: 500,
                    message: "server error".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(TranscribeError::ApiError { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!audio.exists());
    }

    #[tokio::test]
    async fn missing_audio_file_does_not_mask_result() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("never-written.wav");

        let result = transcribe_with_retry(&audio, 2, Duration::from_millis(1), || async {
            Ok("transcript".to_string())
        })
        .await;

        assert_eq!(result.unwrap(), "transcript");
    }
}
