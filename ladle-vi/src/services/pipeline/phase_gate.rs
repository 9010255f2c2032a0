//! Phase 3: ANALYZING_DATA_SUFFICIENCY
//!
//! Asks the classifier whether the gathered text alone supports a
//! complete recipe, then applies the confidence gate. A skip verdict
//! moves the job to OCR_SKIPPED; otherwise the caller proceeds to the
//! OCR phase. The verdict is recorded on the job either way so the
//! fallback controller can reuse the original confidence later.

use super::{record_timing, IngestPipeline, RunContext};
use crate::models::{IngestError, IngestJob, JobStatus};
use crate::services::{should_skip_ocr, GateDecision};
use std::time::Instant;

impl IngestPipeline {
    pub(super) async fn phase_gate(
        &self,
        job: &mut IngestJob,
        ctx: &RunContext,
    ) -> Result<GateDecision, IngestError> {
        self.advance(job, JobStatus::AnalyzingDataSufficiency).await?;

        let started = Instant::now();
        let verdict = self
            .sufficiency_analyzer
            .analyze(
                job.title.as_deref().unwrap_or(""),
                job.transcript.as_deref().unwrap_or(""),
                ctx.description.as_deref().unwrap_or(""),
            )
            .await;
        record_timing(job, "sufficiency", started);

        let decision = should_skip_ocr(&verdict, self.config.sufficiency_threshold);
        tracing::info!(
            job_id = %job.job_id,
            is_sufficient = verdict.is_sufficient,
            confidence = verdict.confidence_score,
            threshold = decision.threshold,
            skip_ocr = decision.skip_ocr,
            "Sufficiency gate decided"
        );

        job.sufficiency = Some(verdict);
        job.ocr_skipped = Some(decision.skip_ocr);

        if decision.skip_ocr {
            self.advance(job, JobStatus::OcrSkipped).await?;
            self.emit_progress(
                job,
                "OCR_SKIPPED",
                format!(
                    "Visual text extraction skipped (confidence {:.2})",
                    decision.confidence_score
                ),
            );
        }

        Ok(decision)
    }
}
