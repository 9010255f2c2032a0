//! Phase 5: LLM_REFINING
//!
//! Runs the structuring stage over the gathered text, scores the result,
//! and applies the quality-triggered fallback: when OCR was skipped on
//! classifier confidence but the draft contradicts that confidence, one
//! fallback OCR pass runs and structuring repeats with the recognized
//! text merged in. The fallback draft replaces the original only when it
//! scores strictly higher. Ends at one of the three draft outcomes;
//! only LLM transport failure lands at LLM_FAILED_BUT_CONTINUED with an
//! error code, still without aborting the run.

use super::{record_timing, IngestPipeline, RunContext};
use crate::models::{ErrorCode, IngestError, IngestJob, JobStatus};
use crate::services::ocr_engine::FrameOcr;
use crate::services::RefineOutcome;
use crate::utils::WorkDir;
use std::time::Instant;

impl IngestPipeline {
    pub(super) async fn phase_refine(
        &self,
        job: &mut IngestJob,
        ctx: &mut RunContext,
        workdir: &WorkDir,
    ) -> Result<(), IngestError> {
        self.advance(job, JobStatus::LlmRefining).await?;

        let started = Instant::now();
        let mut outcome = match self.refine_draft(job, &ctx.ocr_frames).await {
            Ok(outcome) => outcome,
            Err(error) => {
                record_timing(job, "refine", started);
                return self.finish_without_draft(job, error).await;
            }
        };
        record_timing(job, "refine", started);

        let mut quality = self.quality_analyzer.analyze(outcome.draft.as_ref());
        tracing::info!(
            job_id = %job.job_id,
            quality_score = quality.quality_score,
            is_complete = quality.is_complete,
            "Draft quality scored"
        );

        // Fallback controller: only a job that skipped OCR and has not
        // yet run a fallback pass is eligible
        if job.ocr_skipped == Some(true) && !job.fallback_triggered {
            let confidence = job
                .sufficiency
                .as_ref()
                .map(|s| s.confidence_score)
                .unwrap_or(0.0);
            let decision = self.quality_analyzer.should_trigger_fallback(&quality, confidence);

            if decision.should_fallback {
                tracing::info!(
                    job_id = %job.job_id,
                    reasons = ?decision.reasons,
                    "Draft quality contradicts skip decision, running fallback OCR"
                );
                job.fallback_triggered = true;
                self.advance(job, JobStatus::FallbackOcrTriggered).await?;
                self.emit_progress(job, "FALLBACK_OCR_TRIGGERED", decision.reasons.join("; "));

                self.phase_ocr(job, ctx, workdir).await?;
                self.advance(job, JobStatus::LlmRefining).await?;

                let fb_started = Instant::now();
                match self.refine_draft(job, &ctx.ocr_frames).await {
                    Ok(fb_outcome) => {
                        record_timing(job, "fallback_refine", fb_started);
                        let fb_quality = self.quality_analyzer.analyze(fb_outcome.draft.as_ref());
                        if fb_quality.quality_score > quality.quality_score {
                            tracing::info!(
                                job_id = %job.job_id,
                                original_score = quality.quality_score,
                                fallback_score = fb_quality.quality_score,
                                "Fallback draft kept"
                            );
                            outcome = fb_outcome;
                            quality = fb_quality;
                        } else {
                            tracing::info!(
                                job_id = %job.job_id,
                                original_score = quality.quality_score,
                                fallback_score = fb_quality.quality_score,
                                "Fallback draft discarded, original kept"
                            );
                        }
                    }
                    Err(error) => {
                        record_timing(job, "fallback_refine", fb_started);
                        tracing::warn!(
                            job_id = %job.job_id,
                            error = %error,
                            "Fallback structuring failed, keeping original draft"
                        );
                    }
                }
            }
        }

        self.emit_progress(
            job,
            "LLM_REFINING",
            format!("Draft quality score {:.2}", quality.quality_score),
        );

        job.llm_model_used = Some(outcome.model_used.clone());
        job.llm_processing_ms = Some(outcome.processing_ms as i64);

        match (outcome.draft, outcome.parse_error) {
            (Some(draft), None) => {
                job.recipe_draft = Some(draft_to_value(&draft)?);
                job.parse_errors.clear();
                self.advance(job, JobStatus::DraftParsed).await?;
            }
            (Some(draft), Some(error)) => {
                job.recipe_draft = Some(draft_to_value(&draft)?);
                job.parse_errors = vec![error];
                self.advance(job, JobStatus::DraftParsedWithErrors).await?;
            }
            (None, error) => {
                job.parse_errors = error.into_iter().collect();
                let detail = job.parse_errors.join("; ");
                let error = IngestError::with_detail(ErrorCode::ValidationFailed, detail);
                job.error_code = Some(error.code);
                job.error_message = Some(error.full_message());
                self.advance(job, JobStatus::LlmFailedButContinued).await?;
            }
        }

        Ok(())
    }

    async fn refine_draft(
        &self,
        job: &IngestJob,
        ocr_frames: &[FrameOcr],
    ) -> Result<RefineOutcome, IngestError> {
        self.refiner
            .refine(
                job.title.as_deref().unwrap_or(""),
                job.transcript.as_deref().unwrap_or(""),
                ocr_frames,
                &job.url,
                job.author_handle.as_deref(),
                job.thumbnail_url.as_deref(),
                job.job_id,
            )
            .await
            .map_err(|e| IngestError::with_detail(ErrorCode::LlmFailed, e.to_string()))
    }

    /// LLM transport failed after retries: record the error and finish
    /// the run without a draft.
    async fn finish_without_draft(
        &self,
        job: &mut IngestJob,
        error: IngestError,
    ) -> Result<(), IngestError> {
        tracing::warn!(
            job_id = %job.job_id,
            error = %error,
            "Structuring failed, finishing without a draft"
        );
        job.error_code = Some(error.code);
        job.error_message = Some(error.full_message());
        self.advance(job, JobStatus::LlmFailedButContinued).await?;
        Ok(())
    }
}

fn draft_to_value(draft: &crate::models::RecipeDraft) -> Result<serde_json::Value, IngestError> {
    serde_json::to_value(draft).map_err(|e| {
        IngestError::with_detail(
            ErrorCode::UnknownError,
            format!("failed to serialize draft: {}", e),
        )
    })
}
