//! Ingestion API handlers
//!
//! POST /ingest/start accepts a video URL, creates the job and its
//! paired recipe record stub, and spawns the pipeline run in the
//! background. GET /ingest/status polls the full job projection.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    CompletenessEstimate, IngestJob, RecipeDraft, RecipeRecord, RecipeStats, StageTimings,
};
use crate::AppState;

/// POST /ingest/start request
#[derive(Debug, Deserialize)]
pub struct StartIngestRequest {
    pub url: String,
    pub owner_uid: String,
}

/// POST /ingest/start response
#[derive(Debug, Serialize)]
pub struct StartIngestResponse {
    pub job_id: Uuid,
    pub recipe_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Gate decision audit block on the status projection
#[derive(Debug, Serialize)]
pub struct SufficiencyBlock {
    pub is_sufficient: bool,
    pub confidence_score: f64,
    pub reasoning: String,
    pub estimated_completeness: CompletenessEstimate,
    pub threshold: f64,
}

/// GET /ingest/status response
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub recipe_id: String,
    pub url: String,
    pub owner_uid: String,
    pub status: String,
    pub title: Option<String>,
    pub transcript: Option<String>,
    pub ocr_skipped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sufficiency: Option<SufficiencyBlock>,
    pub fallback_triggered: bool,
    pub recipe_json: Option<serde_json::Value>,
    pub parse_errors: Vec<String>,
    pub has_parse_errors: bool,
    pub llm_model_used: Option<String>,
    pub llm_processing_time_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_stats: Option<RecipeStats>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub thumbnail_url: Option<String>,
    pub author_handle: Option<String>,
    pub stage_timings: StageTimings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

/// POST /ingest/start
///
/// Validates the request, persists a QUEUED job plus its DRAFT record
/// stub, and spawns the pipeline. Returns immediately with the new ids.
pub async fn start_ingest(
    State(state): State<AppState>,
    Json(request): Json<StartIngestRequest>,
) -> ApiResult<Json<StartIngestResponse>> {
    let url = request.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ApiError::BadRequest(format!(
            "url must be an http(s) URL: {:?}",
            request.url
        )));
    }
    let owner_uid = request.owner_uid.trim();
    if owner_uid.is_empty() {
        return Err(ApiError::BadRequest(
            "owner_uid cannot be empty".to_string(),
        ));
    }

    if let Some(existing) = db::jobs::find_active_job_by_url(&state.db, url).await? {
        return Err(ApiError::Conflict(format!(
            "URL is already being ingested by job {}",
            existing
        )));
    }

    let job = IngestJob::new(url.to_string(), owner_uid.to_string());
    let record = RecipeRecord::stub(
        job.recipe_id.clone(),
        job.owner_uid.clone(),
        job.job_id,
        job.url.clone(),
    );

    // Stub first: a failed job save leaves only an orphan DRAFT stub,
    // while a job without its stub could never be finalized
    db::recipes::create_stub(&state.db, &record).await?;
    db::jobs::save_job(&state.db, &job).await?;

    let response = StartIngestResponse {
        job_id: job.job_id,
        recipe_id: job.recipe_id.clone(),
        status: job.status.as_str().to_string(),
        created_at: job.created_at,
    };

    tracing::info!(
        job_id = %job.job_id,
        recipe_id = %job.recipe_id,
        url = %job.url,
        "Ingestion job accepted"
    );

    let pipeline = state.pipeline.clone();
    let job_id_for_logging = job.job_id;
    tokio::spawn(async move {
        let finished = pipeline.run(job).await;
        tracing::info!(
            job_id = %job_id_for_logging,
            status = finished.status.as_str(),
            "Background ingestion task finished"
        );
    });

    Ok(Json(response))
}

/// GET /ingest/status/{job_id}
///
/// Full job projection, including the gate audit block and recipe stats
/// computed from the draft. 404 for unknown ids.
pub async fn get_ingest_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobStatusResponse>> {
    let job = db::jobs::load_job(&state.db, job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Ingestion job not found: {}", job_id)))?;

    tracing::debug!(job_id = %job_id, status = job.status.as_str(), "Status query");

    let recipe_stats = job
        .recipe_draft
        .as_ref()
        .and_then(|value| serde_json::from_value::<RecipeDraft>(value.clone()).ok())
        .map(|draft| RecipeStats::from_draft(&draft));

    let sufficiency = job.sufficiency.as_ref().map(|s| SufficiencyBlock {
        is_sufficient: s.is_sufficient,
        confidence_score: s.confidence_score,
        reasoning: s.reasoning.clone(),
        estimated_completeness: s.estimated_completeness,
        threshold: state.config.pipeline.sufficiency_threshold,
    });

    let response = JobStatusResponse {
        job_id: job.job_id,
        recipe_id: job.recipe_id,
        url: job.url,
        owner_uid: job.owner_uid,
        status: job.status.as_str().to_string(),
        title: job.title,
        transcript: job.transcript,
        ocr_skipped: job.ocr_skipped,
        sufficiency,
        fallback_triggered: job.fallback_triggered,
        recipe_json: job.recipe_draft,
        has_parse_errors: !job.parse_errors.is_empty(),
        parse_errors: job.parse_errors,
        llm_model_used: job.llm_model_used,
        llm_processing_time_seconds: job.llm_processing_ms.map(|ms| ms as f64 / 1000.0),
        recipe_stats,
        error_code: job.error_code.map(|c| c.as_str().to_string()),
        error_message: job.error_message,
        thumbnail_url: job.thumbnail_url,
        author_handle: job.author_handle,
        stage_timings: job.stage_timings,
        created_at: job.created_at,
        updated_at: job.updated_at,
        ended_at: job.ended_at,
    };

    Ok(Json(response))
}

/// Build ingestion routes
pub fn ingest_routes() -> Router<AppState> {
    Router::new()
        .route("/ingest/start", post(start_ingest))
        .route("/ingest/status/:job_id", get(get_ingest_status))
}
