//! Phase 1: DOWNLOADING
//!
//! Fetches the source video into the run's working directory and captures
//! the downloader metadata (title, description, author, thumbnail) for
//! later stages. Fatal on failure; an unreachable source is reported with
//! its own taxonomy code so callers can distinguish "gone" from "broken".

use super::{record_timing, IngestPipeline, RunContext};
use crate::models::{ErrorCode, IngestError, IngestJob, JobStatus};
use crate::services::FetchError;
use crate::utils::WorkDir;
use std::time::Instant;

impl IngestPipeline {
    pub(super) async fn phase_fetch(
        &self,
        job: &mut IngestJob,
        ctx: &mut RunContext,
        workdir: &WorkDir,
    ) -> Result<(), IngestError> {
        self.advance(job, JobStatus::Downloading).await?;
        tracing::info!(job_id = %job.job_id, url = %job.url, "Downloading source video");

        let started = Instant::now();
        let fetched = self
            .fetcher
            .fetch(&job.url, workdir.path())
            .await
            .map_err(|e| {
                let code = match &e {
                    FetchError::Unavailable => ErrorCode::VideoUnavailable,
                    _ => ErrorCode::DownloadFailed,
                };
                IngestError::with_detail(code, e.to_string())
            })?;
        record_timing(job, "download", started);

        job.thumbnail_url = fetched.thumbnail_url;
        job.author_handle = fetched.uploader;
        ctx.metadata_title = fetched.title;
        ctx.description = fetched.description;

        tracing::debug!(
            job_id = %job.job_id,
            video = %fetched.video_path.display(),
            has_title = ctx.metadata_title.is_some(),
            "Video downloaded"
        );
        self.emit_progress(job, "DOWNLOADING", "Video downloaded");
        Ok(())
    }
}
