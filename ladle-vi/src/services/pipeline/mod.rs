//! Ingestion pipeline
//!
//! Drives one job through all stages, saving the full job row after every
//! status transition and broadcasting events for subscribers.
//!
//! # State Progression
//! QUEUED → DOWNLOADING → EXTRACTING → TRANSCRIBING → DRAFT_TRANSCRIBED
//! → ANALYZING_DATA_SUFFICIENCY → { OCR_SKIPPED | OCRING → OCR_DONE/OCR_FAILED_BUT_CONTINUED }
//! → LLM_REFINING → [ FALLBACK_OCR_TRIGGERED → OCRING → LLM_REFINING ]
//! → { DRAFT_PARSED | DRAFT_PARSED_WITH_ERRORS | LLM_FAILED_BUT_CONTINUED }
//! → COMPLETED
//!
//! # Architecture
//! Each state group is handled by a dedicated `phase_*` method:
//!
//! - **DOWNLOADING** (phase_fetch): fetch the source video, capture metadata
//! - **EXTRACTING/TRANSCRIBING** (phase_transcribe): audio track + speech-to-text
//! - **ANALYZING_DATA_SUFFICIENCY** (phase_gate): classifier + skip decision
//! - **OCRING** (phase_ocr): frame sampling + on-screen text recognition,
//!   reused by the fallback pass
//! - **LLM_REFINING** (phase_refine): structuring, quality scoring, fallback
//! - **Persistence** (phase_persist): record finalize + COMPLETED, exactly once
//!
//! Fatal faults (download, audio extraction, transcription) abort the run;
//! the outer loop in [`IngestPipeline::run`] retries a failed run from
//! QUEUED with exponential backoff before marking the job FAILED. OCR and
//! LLM faults degrade within the run instead of aborting it.

use crate::db;
use crate::models::{ErrorCode, IngestError, IngestJob, JobStatus};
use crate::services::llm::LlmProvider;
use crate::services::ocr_engine::FrameOcr;
use crate::services::{
    create_provider, AudioExtractor, FfmpegAudioExtractor, FfmpegFrameSampler, FrameSampler,
    QualityAnalyzer, Refiner, SufficiencyAnalyzer, TesseractOcr, TextRecognizer, Transcriber,
    VideoFetcher, WhisperTranscriber, YtDlpFetcher,
};
use crate::utils::WorkDir;
use chrono::Utc;
use ladle_common::config::{PipelineConfig, TomlConfig};
use ladle_common::events::{EventBus, IngestEvent};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

// Phase modules (internal implementation)
mod phase_fetch;
mod phase_gate;
mod phase_ocr;
mod phase_persist;
mod phase_refine;
mod phase_transcribe;

/// Per-run scratch state threaded through the phases.
///
/// Holds values a later stage needs that do not belong on the persisted
/// job row, like downloader metadata and the recognized frames (the job
/// stores only the flattened text lines).
#[derive(Debug, Default)]
pub(super) struct RunContext {
    pub(super) metadata_title: Option<String>,
    pub(super) description: Option<String>,
    pub(super) ocr_frames: Vec<FrameOcr>,
}

/// Ingestion pipeline service
pub struct IngestPipeline {
    db: SqlitePool,
    event_bus: EventBus,
    config: PipelineConfig,
    work_root: PathBuf,
    fetcher: Arc<dyn VideoFetcher>,
    audio_extractor: Arc<dyn AudioExtractor>,
    transcriber: Arc<dyn Transcriber>,
    frame_sampler: Arc<dyn FrameSampler>,
    text_recognizer: Arc<dyn TextRecognizer>,
    provider: Arc<dyn LlmProvider>,
    sufficiency_analyzer: SufficiencyAnalyzer,
    refiner: Refiner,
    quality_analyzer: QualityAnalyzer,
    /// Base delay between whole-run retry attempts (doubled per attempt)
    retry_backoff: Duration,
}

impl IngestPipeline {
    /// Create a pipeline with the production adapters from config.
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        config: &TomlConfig,
        work_root: PathBuf,
        asr_api_key: String,
        llm_api_key: String,
    ) -> Self {
        let provider: Arc<dyn LlmProvider> = Arc::from(create_provider(&config.llm, llm_api_key));

        Self {
            db,
            event_bus,
            config: config.pipeline.clone(),
            work_root,
            fetcher: Arc::new(YtDlpFetcher::new(&config.tools.yt_dlp_path)),
            audio_extractor: Arc::new(FfmpegAudioExtractor::new(&config.tools.ffmpeg_path)),
            transcriber: Arc::new(WhisperTranscriber::new(
                &config.asr.endpoint,
                &config.asr.model,
                asr_api_key,
            )),
            frame_sampler: Arc::new(FfmpegFrameSampler::new(
                &config.tools.ffmpeg_path,
                config.pipeline.scene_threshold,
            )),
            text_recognizer: Arc::new(TesseractOcr::new(&config.tools.tesseract_path)),
            sufficiency_analyzer: SufficiencyAnalyzer::new(provider.clone()),
            refiner: Refiner::new(provider.clone()),
            provider,
            quality_analyzer: QualityAnalyzer::new(),
            retry_backoff: Duration::from_secs(2),
        }
    }

    /// Create a pipeline with caller-supplied adapters.
    #[allow(clippy::too_many_arguments)]
    pub fn with_adapters(
        db: SqlitePool,
        event_bus: EventBus,
        config: PipelineConfig,
        work_root: PathBuf,
        fetcher: Arc<dyn VideoFetcher>,
        audio_extractor: Arc<dyn AudioExtractor>,
        transcriber: Arc<dyn Transcriber>,
        frame_sampler: Arc<dyn FrameSampler>,
        text_recognizer: Arc<dyn TextRecognizer>,
        provider: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            db,
            event_bus,
            config,
            work_root,
            fetcher,
            audio_extractor,
            transcriber,
            frame_sampler,
            text_recognizer,
            sufficiency_analyzer: SufficiencyAnalyzer::new(provider.clone()),
            refiner: Refiner::new(provider.clone()),
            provider,
            quality_analyzer: QualityAnalyzer::new(),
            retry_backoff: Duration::from_secs(2),
        }
    }

    /// Shrink the retry delays, for tests that exercise failure paths.
    pub fn with_backoffs(mut self, run_retry: Duration, llm_transport: Duration) -> Self {
        self.retry_backoff = run_retry;
        self.refiner = Refiner::new(self.provider.clone()).with_transport_backoff(llm_transport);
        self
    }

    /// Execute the complete ingestion run for one job.
    ///
    /// A run that aborts on a fatal fault is retried from QUEUED with
    /// exponential backoff until `max_run_attempts` is reached, then the
    /// job is marked FAILED. The returned job carries the terminal state.
    pub async fn run(&self, mut job: IngestJob) -> IngestJob {
        let max_attempts = self.config.max_run_attempts.max(1);

        for attempt in 1..=max_attempts {
            let attempt_started = Instant::now();
            match self.run_once(&mut job).await {
                Ok(()) => break,
                Err(error) => {
                    tracing::error!(
                        job_id = %job.job_id,
                        attempt,
                        max_attempts,
                        code = %error.code,
                        "Ingestion run failed: {}",
                        error.full_message()
                    );

                    if attempt < max_attempts {
                        self.emit_progress(
                            &job,
                            "RETRY",
                            format!("Attempt {} failed, retrying: {}", attempt, error.full_message()),
                        );
                        tokio::time::sleep(self.retry_backoff * 2u32.pow(attempt - 1)).await;

                        job.reset_for_retry();
                        if let Err(e) = db::jobs::save_job(&self.db, &job).await {
                            tracing::error!(
                                job_id = %job.job_id,
                                error = %e,
                                "Failed to save retry reset"
                            );
                        }
                    } else {
                        record_timing(&mut job, "total_pipeline", attempt_started);
                        self.mark_failed(&mut job, &error).await;
                    }
                }
            }
        }

        job
    }

    /// One pipeline attempt, from DOWNLOADING through persistence.
    ///
    /// The per-job working directory is removed when this returns, on
    /// success and on every error path.
    async fn run_once(&self, job: &mut IngestJob) -> Result<(), IngestError> {
        let workdir = WorkDir::create(&self.work_root, job.job_id).map_err(|e| {
            IngestError::with_detail(
                ErrorCode::UnknownError,
                format!("failed to create working directory: {}", e),
            )
        })?;
        let mut ctx = RunContext::default();
        let run_started = Instant::now();

        self.phase_fetch(job, &mut ctx, &workdir).await?;
        self.phase_transcribe(job, &mut ctx, &workdir).await?;

        let decision = self.phase_gate(job, &ctx).await?;
        if !decision.skip_ocr {
            self.phase_ocr(job, &mut ctx, &workdir).await?;
        }

        self.phase_refine(job, &mut ctx, &workdir).await?;
        self.phase_persist(job).await;

        // Total wall-clock lands on the terminal row
        record_timing(job, "total_pipeline", run_started);
        job.updated_at = Utc::now();
        if let Err(e) = db::jobs::save_job(&self.db, job).await {
            tracing::error!(job_id = %job.job_id, error = %e, "Failed to save final timings");
        }

        Ok(())
    }

    /// Transition the job, save the full row, and broadcast the change.
    pub(super) async fn advance(
        &self,
        job: &mut IngestJob,
        status: JobStatus,
    ) -> Result<(), IngestError> {
        let transition = job.transition_to(status);

        db::jobs::save_job(&self.db, job).await.map_err(|e| {
            IngestError::with_detail(
                ErrorCode::UnknownError,
                format!("failed to save status {}: {}", status, e),
            )
        })?;

        self.event_bus
            .emit(IngestEvent::JobStatusChanged {
                job_id: job.job_id,
                status: status.as_str().to_string(),
                timestamp: transition.transitioned_at,
            })
            .ok();

        tracing::info!(
            job_id = %job.job_id,
            from = %transition.old_status,
            to = %status,
            "Job status changed"
        );
        Ok(())
    }

    /// Broadcast stage progress detail (lossy, no persistence).
    pub(super) fn emit_progress(&self, job: &IngestJob, stage: &str, detail: impl Into<String>) {
        self.event_bus
            .emit(IngestEvent::JobProgress {
                job_id: job.job_id,
                stage: stage.to_string(),
                detail: detail.into(),
                timestamp: Utc::now(),
            })
            .ok();
    }

    /// Record the fatal error and move the job to FAILED.
    async fn mark_failed(&self, job: &mut IngestJob, error: &IngestError) {
        job.error_code = Some(error.code);
        job.error_message = Some(error.full_message());

        if let Err(e) = self.advance(job, JobStatus::Failed).await {
            tracing::error!(
                job_id = %job.job_id,
                error = %e,
                "Failed to record FAILED status"
            );
        }

        self.event_bus
            .emit(IngestEvent::JobFailed {
                job_id: job.job_id,
                error_code: error.code.as_str().to_string(),
                timestamp: Utc::now(),
            })
            .ok();
    }
}

/// Record the elapsed wall-clock time for a stage on the job.
pub(super) fn record_timing(job: &mut IngestJob, stage: &str, started: Instant) {
    let seconds = started.elapsed().as_secs_f64();
    tracing::debug!(job_id = %job.job_id, stage, "Stage finished in {:.2}s", seconds);
    job.stage_timings.record(stage, seconds);
}
