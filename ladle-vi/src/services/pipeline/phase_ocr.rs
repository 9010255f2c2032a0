//! Phase 4: OCRING
//!
//! Samples frames from the downloaded video and recognizes on-screen
//! text. Scene-change sampling runs first; when it yields nothing the
//! sampler retries at a fixed rate. Recognized lines are near-duplicate
//! merged, flattened onto the job, and the structured frames kept in the
//! run context for the prompt builder. Any failure here degrades to
//! OCR_FAILED_BUT_CONTINUED instead of aborting the run.
//!
//! The fallback pass re-enters through the same method; the stage timing
//! key and the title re-resolution behave the same both times.

use super::{record_timing, IngestPipeline, RunContext};
use crate::models::{ErrorCode, IngestError, IngestJob, JobStatus};
use crate::services::ocr_engine::{merge_near_duplicates, FrameOcr};
use crate::services::{SamplingMethod, TitleResolver};
use crate::utils::WorkDir;
use std::time::Instant;

/// Sampling rate for the fixed-rate retry when scene detection finds
/// no cuts (common for single-shot cooking clips)
const FALLBACK_SAMPLE_FPS: f64 = 1.0;

impl IngestPipeline {
    pub(super) async fn phase_ocr(
        &self,
        job: &mut IngestJob,
        ctx: &mut RunContext,
        workdir: &WorkDir,
    ) -> Result<(), IngestError> {
        self.advance(job, JobStatus::Ocring).await?;

        let stage_key = if job.fallback_triggered {
            "fallback_ocr"
        } else {
            "ocr"
        };
        let started = Instant::now();

        match self.sample_and_recognize(workdir).await {
            Ok(frames) => {
                record_timing(job, stage_key, started);

                let lines: Vec<String> = frames
                    .iter()
                    .flat_map(|f| f.lines.iter().map(|l| l.text.clone()))
                    .collect();
                tracing::info!(
                    job_id = %job.job_id,
                    frames = frames.len(),
                    lines = lines.len(),
                    "On-screen text recognized"
                );

                job.ocr_text.extend(lines);
                ctx.ocr_frames.extend(frames);
                self.advance(job, JobStatus::OcrDone).await?;
            }
            Err(error) => {
                record_timing(job, stage_key, started);
                tracing::warn!(
                    job_id = %job.job_id,
                    error = %error,
                    "OCR failed, continuing without visual text"
                );
                self.emit_progress(job, "OCRING", error.full_message());
                self.advance(job, JobStatus::OcrFailedButContinued).await?;
            }
        }

        // Late title resolution for jobs whose metadata and transcript
        // yielded nothing
        if job.title.as_deref().map_or(true, str::is_empty) && !ctx.ocr_frames.is_empty() {
            let resolved = TitleResolver::resolve(
                ctx.metadata_title.as_deref(),
                job.transcript.as_deref().unwrap_or(""),
                &ctx.ocr_frames,
            );
            if !resolved.is_empty() {
                job.title = Some(resolved);
            }
        }

        Ok(())
    }

    async fn sample_and_recognize(&self, workdir: &WorkDir) -> Result<Vec<FrameOcr>, IngestError> {
        let video_path = workdir.video_path();
        let frames_dir = workdir.frames_dir();
        let max_frames = self.config.max_frames as u32;

        let mut sampled = match self
            .frame_sampler
            .sample(&video_path, &frames_dir, SamplingMethod::SceneChange, max_frames)
            .await
        {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!(error = %e, "Scene-change sampling failed, retrying at fixed rate");
                Vec::new()
            }
        };

        if sampled.is_empty() {
            sampled = self
                .frame_sampler
                .sample(
                    &video_path,
                    &frames_dir,
                    SamplingMethod::FixedRate {
                        fps: FALLBACK_SAMPLE_FPS,
                    },
                    max_frames,
                )
                .await
                .map_err(|e| {
                    IngestError::with_detail(ErrorCode::FrameExtractionFailed, e.to_string())
                })?;
        }

        if sampled.is_empty() {
            return Err(IngestError::with_detail(
                ErrorCode::FrameExtractionFailed,
                "no frames sampled",
            ));
        }

        let recognized = self
            .text_recognizer
            .recognize(&sampled)
            .await
            .map_err(|e| IngestError::with_detail(ErrorCode::OcrFailed, e.to_string()))?;

        Ok(merge_near_duplicates(
            recognized,
            self.config.ocr_similarity_threshold,
        ))
    }
}
