//! Phase 6: persistence
//!
//! Two dependent writes: the recipe record stub is finalized with the
//! draft payload, then the job row is updated to COMPLETED. The job
//! update only happens after the record write succeeds; if the job
//! update fails the record is already ACTIVE but the job keeps its
//! draft status with a PERSIST_FAILED code, leaving the mismatch
//! visible in the status projection instead of reporting a completion
//! that was never recorded. Jobs that finished without a draft never
//! reach this phase.

use super::{record_timing, IngestPipeline};
use crate::db;
use crate::models::{ErrorCode, IngestError, IngestJob, JobStatus};
use chrono::Utc;
use ladle_common::events::IngestEvent;
use std::time::Instant;

impl IngestPipeline {
    pub(super) async fn phase_persist(&self, job: &mut IngestJob) {
        if !matches!(
            job.status,
            JobStatus::DraftParsed | JobStatus::DraftParsedWithErrors
        ) {
            return;
        }

        if self.save_recipe_and_update_job(job).await.is_none() {
            let error = IngestError::new(ErrorCode::PersistFailed);
            job.error_code = Some(error.code);
            job.error_message = Some(error.full_message());
            job.updated_at = Utc::now();
            if let Err(e) = db::jobs::save_job(&self.db, job).await {
                tracing::error!(
                    job_id = %job.job_id,
                    error = %e,
                    "Failed to record persistence error on job"
                );
            }
            self.emit_progress(job, "PERSIST", error.full_message());
        }
    }

    /// Finalize the recipe record, then mark the job COMPLETED. Returns
    /// the recipe id on success, None when either write failed. When the
    /// record write succeeded but the job update did not, the in-memory
    /// status is reverted so the caller records PERSIST_FAILED against
    /// the draft status rather than a phantom COMPLETED.
    pub(super) async fn save_recipe_and_update_job(&self, job: &mut IngestJob) -> Option<String> {
        let draft_value = job.recipe_draft.clone()?;
        let title = draft_value
            .get("title")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| job.title.clone())
            .unwrap_or_default();

        let started = Instant::now();
        if let Err(e) = db::recipes::finalize_recipe(
            &self.db,
            &job.recipe_id,
            &title,
            &draft_value,
            job.author_handle.as_deref(),
            job.thumbnail_url.as_deref(),
        )
        .await
        {
            tracing::error!(
                job_id = %job.job_id,
                recipe_id = %job.recipe_id,
                error = %e,
                "Failed to save recipe record"
            );
            return None;
        }
        record_timing(job, "persist", started);

        let prior_status = job.status;
        let prior_ended_at = job.ended_at;
        let transition = job.transition_to(JobStatus::Completed);
        if let Err(e) = db::jobs::save_job(&self.db, job).await {
            tracing::error!(
                job_id = %job.job_id,
                error = %e,
                "Recipe record saved but job update failed"
            );
            job.status = prior_status;
            job.ended_at = prior_ended_at;
            return None;
        }

        self.event_bus
            .emit(IngestEvent::JobStatusChanged {
                job_id: job.job_id,
                status: JobStatus::Completed.as_str().to_string(),
                timestamp: transition.transitioned_at,
            })
            .ok();
        self.event_bus
            .emit(IngestEvent::JobCompleted {
                job_id: job.job_id,
                recipe_id: job.recipe_id.clone(),
                timestamp: Utc::now(),
            })
            .ok();

        tracing::info!(
            job_id = %job.job_id,
            recipe_id = %job.recipe_id,
            "Recipe persisted, job completed"
        );
        Some(job.recipe_id.clone())
    }
}
