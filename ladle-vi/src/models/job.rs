//! Ingest job state machine
//!
//! A job progresses linearly through the pipeline stages, with one
//! conditional branch (OCR skipped or run) and one optional loop-back
//! (quality-triggered fallback OCR + re-structuring):
//!
//! QUEUED → DOWNLOADING → EXTRACTING → TRANSCRIBING → DRAFT_TRANSCRIBED
//! → ANALYZING_DATA_SUFFICIENCY → { OCR_SKIPPED | OCRING → OCR_DONE/OCR_FAILED_BUT_CONTINUED }
//! → LLM_REFINING → [ FALLBACK_OCR_TRIGGERED → OCRING → LLM_REFINING ]
//! → { DRAFT_PARSED | DRAFT_PARSED_WITH_ERRORS | LLM_FAILED_BUT_CONTINUED }
//! → COMPLETED, with FAILED reachable from any stage.

use crate::models::{ErrorCode, SufficiencyResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Ingest job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Created, waiting for the run to start
    Queued,
    /// Fetching the source video
    Downloading,
    /// Extracting the audio track
    Extracting,
    /// Speech-to-text over the audio track
    Transcribing,
    /// Transcript available
    DraftTranscribed,
    /// Classifier judging whether text alone suffices
    AnalyzingDataSufficiency,
    /// Gate decided OCR is unnecessary
    OcrSkipped,
    /// Frame sampling + on-screen text recognition in progress
    Ocring,
    /// OCR finished with recognized text
    OcrDone,
    /// OCR failed; run continues with empty visual text
    OcrFailedButContinued,
    /// LLM structuring in progress
    LlmRefining,
    /// Quality contradicted the skip decision; second OCR pass queued
    FallbackOcrTriggered,
    /// Structuring produced a valid draft
    DraftParsed,
    /// Structuring produced a draft with validation errors
    DraftParsedWithErrors,
    /// LLM transport failed; run finished without a structured draft
    LlmFailedButContinued,
    /// Record persisted, job finished
    Completed,
    /// Run failed with an attached error code
    Failed,
}

impl JobStatus {
    /// String form matching the serialized representation
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Downloading => "DOWNLOADING",
            JobStatus::Extracting => "EXTRACTING",
            JobStatus::Transcribing => "TRANSCRIBING",
            JobStatus::DraftTranscribed => "DRAFT_TRANSCRIBED",
            JobStatus::AnalyzingDataSufficiency => "ANALYZING_DATA_SUFFICIENCY",
            JobStatus::OcrSkipped => "OCR_SKIPPED",
            JobStatus::Ocring => "OCRING",
            JobStatus::OcrDone => "OCR_DONE",
            JobStatus::OcrFailedButContinued => "OCR_FAILED_BUT_CONTINUED",
            JobStatus::LlmRefining => "LLM_REFINING",
            JobStatus::FallbackOcrTriggered => "FALLBACK_OCR_TRIGGERED",
            JobStatus::DraftParsed => "DRAFT_PARSED",
            JobStatus::DraftParsedWithErrors => "DRAFT_PARSED_WITH_ERRORS",
            JobStatus::LlmFailedButContinued => "LLM_FAILED_BUT_CONTINUED",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// True for statuses from which no further transition happens this run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed
                | JobStatus::Failed
                | JobStatus::LlmFailedButContinued
                | JobStatus::DraftParsed
                | JobStatus::DraftParsedWithErrors
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransition {
    pub job_id: Uuid,
    pub old_status: JobStatus,
    pub new_status: JobStatus,
    pub transitioned_at: DateTime<Utc>,
}

/// Per-stage wall-clock durations in seconds, keyed by stage name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings(pub BTreeMap<String, f64>);

impl StageTimings {
    pub fn record(&mut self, stage: &str, seconds: f64) {
        self.0.insert(stage.to_string(), seconds);
    }

    pub fn get(&self, stage: &str) -> Option<f64> {
        self.0.get(stage).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ingest job (in-memory state, mirrored to the jobs table)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestJob {
    /// Unique job identifier
    pub job_id: Uuid,

    /// Source video URL
    pub url: String,

    /// Owning user
    pub owner_uid: String,

    /// Identifier of the record stub created with this job (`rec_<uuid>`)
    pub recipe_id: String,

    /// Current pipeline status
    pub status: JobStatus,

    /// Resolved human-readable title
    pub title: Option<String>,

    /// Speech-to-text transcript
    pub transcript: Option<String>,

    /// Merged on-screen text blocks (empty when OCR skipped or failed)
    pub ocr_text: Vec<String>,

    /// Sufficiency classification result (recorded for audit)
    pub sufficiency: Option<SufficiencyResult>,

    /// Gate decision: true = OCR bypassed, false = OCR ran, None = not decided yet
    pub ocr_skipped: Option<bool>,

    /// Whether the quality-driven fallback pass has run for this job
    pub fallback_triggered: bool,

    /// Structured recipe draft (raw JSON as produced by structuring)
    pub recipe_draft: Option<serde_json::Value>,

    /// Validation errors from the structuring stage
    pub parse_errors: Vec<String>,

    /// Model identifier used for structuring
    pub llm_model_used: Option<String>,

    /// Structuring wall-clock time in milliseconds
    pub llm_processing_ms: Option<i64>,

    /// Error taxonomy code, set on failure
    pub error_code: Option<ErrorCode>,

    /// Error message (static base + contextual detail)
    pub error_message: Option<String>,

    /// Thumbnail reference from downloader metadata
    pub thumbnail_url: Option<String>,

    /// Author handle from downloader metadata
    pub author_handle: Option<String>,

    /// Per-stage durations
    pub stage_timings: StageTimings,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Set when the job reaches a terminal status
    pub ended_at: Option<DateTime<Utc>>,
}

impl IngestJob {
    /// Create a new queued job with its paired record identifier
    pub fn new(url: String, owner_uid: String) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4(),
            url,
            owner_uid,
            recipe_id: format!("rec_{}", Uuid::new_v4()),
            status: JobStatus::Queued,
            title: None,
            transcript: None,
            ocr_text: Vec::new(),
            sufficiency: None,
            ocr_skipped: None,
            fallback_triggered: false,
            recipe_draft: None,
            parse_errors: Vec::new(),
            llm_model_used: None,
            llm_processing_ms: None,
            error_code: None,
            error_message: None,
            thumbnail_url: None,
            author_handle: None,
            stage_timings: StageTimings::default(),
            created_at: now,
            updated_at: now,
            ended_at: None,
        }
    }

    /// Transition to a new status
    pub fn transition_to(&mut self, new_status: JobStatus) -> StatusTransition {
        let transition = StatusTransition {
            job_id: self.job_id,
            old_status: self.status,
            new_status,
            transitioned_at: Utc::now(),
        };
        self.status = new_status;
        self.updated_at = transition.transitioned_at;

        if new_status.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
        }

        transition
    }

    /// Check if the job is in a terminal status
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Reset for a whole-run retry: back to QUEUED with stage diagnostics
    /// cleared, identity and timestamps of creation preserved
    pub fn reset_for_retry(&mut self) {
        self.status = JobStatus::Queued;
        self.title = None;
        self.transcript = None;
        self.ocr_text.clear();
        self.sufficiency = None;
        self.ocr_skipped = None;
        self.fallback_triggered = false;
        self.recipe_draft = None;
        self.parse_errors.clear();
        self.llm_model_used = None;
        self.llm_processing_ms = None;
        self.error_code = None;
        self.error_message = None;
        self.stage_timings = StageTimings::default();
        self.ended_at = None;
        self.updated_at = Utc::now();
    }
}
