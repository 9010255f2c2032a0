//! Phase 2: EXTRACTING + TRANSCRIBING
//!
//! Extracts the mono 16 kHz audio track and runs speech-to-text over it.
//! The transcriber owns the audio file and deletes it when done. Both
//! steps are fatal on failure. Ends at DRAFT_TRANSCRIBED with the first
//! title resolution (metadata, then transcript) recorded on the job.

use super::{record_timing, IngestPipeline, RunContext};
use crate::models::{ErrorCode, IngestError, IngestJob, JobStatus};
use crate::services::TitleResolver;
use crate::utils::WorkDir;
use std::time::Instant;

impl IngestPipeline {
    pub(super) async fn phase_transcribe(
        &self,
        job: &mut IngestJob,
        ctx: &mut RunContext,
        workdir: &WorkDir,
    ) -> Result<(), IngestError> {
        self.advance(job, JobStatus::Extracting).await?;

        let started = Instant::now();
        let audio_path = self
            .audio_extractor
            .extract(&workdir.video_path(), &workdir.audio_path())
            .await
            .map_err(|e| {
                IngestError::with_detail(ErrorCode::AudioExtractionFailed, e.to_string())
            })?;
        record_timing(job, "audio_extract", started);

        self.advance(job, JobStatus::Transcribing).await?;

        let started = Instant::now();
        let transcript = self
            .transcriber
            .transcribe(&audio_path)
            .await
            .map_err(|e| IngestError::with_detail(ErrorCode::AsrFailed, e.to_string()))?;
        record_timing(job, "transcribe", started);

        tracing::info!(
            job_id = %job.job_id,
            transcript_chars = transcript.chars().count(),
            "Transcript ready"
        );

        let resolved = TitleResolver::resolve(ctx.metadata_title.as_deref(), &transcript, &[]);
        job.title = if resolved.is_empty() {
            None
        } else {
            Some(resolved)
        };
        job.transcript = Some(transcript);

        self.advance(job, JobStatus::DraftTranscribed).await?;
        Ok(())
    }
}
