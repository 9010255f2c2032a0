//! Ingestion job database operations
//!
//! One row per job. The pipeline owns its job struct in memory and saves
//! the full row after every status transition, so the stored row always
//! reflects the latest stage outputs.

use ladle_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{ErrorCode, IngestJob, JobStatus, StageTimings, SufficiencyResult};
use crate::utils::retry_on_lock;

/// Terminal statuses, in SQL literal form
const TERMINAL_STATUSES: &str =
    "('COMPLETED', 'FAILED', 'DRAFT_PARSED', 'DRAFT_PARSED_WITH_ERRORS', 'LLM_FAILED_BUT_CONTINUED')";

/// Save an ingestion job to the database (insert or update)
///
/// Uses retry_on_lock to handle transient database lock contention between
/// the pipeline task and API handlers sharing the pool.
pub async fn save_job(pool: &SqlitePool, job: &IngestJob) -> Result<()> {
    // Prepare all data BEFORE acquiring database connection
    let job_id = job.job_id.to_string();
    let status = job.status.as_str();
    let ocr_text = serde_json::to_string(&job.ocr_text)
        .map_err(|e| ladle_common::Error::Internal(format!("Failed to serialize ocr_text: {}", e)))?;
    let sufficiency = job
        .sufficiency
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| {
            ladle_common::Error::Internal(format!("Failed to serialize sufficiency: {}", e))
        })?;
    let recipe_json = job
        .recipe_draft
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| {
            ladle_common::Error::Internal(format!("Failed to serialize recipe draft: {}", e))
        })?;
    let parse_errors = serde_json::to_string(&job.parse_errors).map_err(|e| {
        ladle_common::Error::Internal(format!("Failed to serialize parse_errors: {}", e))
    })?;
    let stage_timings = serde_json::to_string(&job.stage_timings).map_err(|e| {
        ladle_common::Error::Internal(format!("Failed to serialize stage_timings: {}", e))
    })?;
    let error_code = job.error_code.map(|c| c.as_str());
    let ocr_skipped = job.ocr_skipped.map(|b| b as i64);
    let fallback_triggered = job.fallback_triggered as i64;
    let created_at = job.created_at.to_rfc3339();
    let updated_at = job.updated_at.to_rfc3339();
    let ended_at = job.ended_at.map(|dt| dt.to_rfc3339());

    // Max lock wait time from settings (default 5000ms)
    let max_wait_ms: i64 = sqlx::query_scalar(
        "SELECT CAST(value AS INTEGER) FROM settings WHERE key = 'vi_database_max_lock_wait_ms'",
    )
    .fetch_optional(pool)
    .await?
    .unwrap_or(5000);

    retry_on_lock("save_job", max_wait_ms as u64, || async {
        sqlx::query(
            r#"
            INSERT INTO ingest_jobs (
                job_id, url, owner_uid, recipe_id, status,
                title, transcript, ocr_text, sufficiency, ocr_skipped,
                fallback_triggered, recipe_json, parse_errors,
                llm_model_used, llm_processing_ms, error_code, error_message,
                thumbnail_url, author_handle, stage_timings,
                created_at, updated_at, ended_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(job_id) DO UPDATE SET
                status = excluded.status,
                title = excluded.title,
                transcript = excluded.transcript,
                ocr_text = excluded.ocr_text,
                sufficiency = excluded.sufficiency,
                ocr_skipped = excluded.ocr_skipped,
                fallback_triggered = excluded.fallback_triggered,
                recipe_json = excluded.recipe_json,
                parse_errors = excluded.parse_errors,
                llm_model_used = excluded.llm_model_used,
                llm_processing_ms = excluded.llm_processing_ms,
                error_code = excluded.error_code,
                error_message = excluded.error_message,
                thumbnail_url = excluded.thumbnail_url,
                author_handle = excluded.author_handle,
                stage_timings = excluded.stage_timings,
                updated_at = excluded.updated_at,
                ended_at = excluded.ended_at
            "#,
        )
        .bind(&job_id)
        .bind(&job.url)
        .bind(&job.owner_uid)
        .bind(&job.recipe_id)
        .bind(status)
        .bind(&job.title)
        .bind(&job.transcript)
        .bind(&ocr_text)
        .bind(&sufficiency)
        .bind(ocr_skipped)
        .bind(fallback_triggered)
        .bind(&recipe_json)
        .bind(&parse_errors)
        .bind(&job.llm_model_used)
        .bind(job.llm_processing_ms)
        .bind(error_code)
        .bind(&job.error_message)
        .bind(&job.thumbnail_url)
        .bind(&job.author_handle)
        .bind(&stage_timings)
        .bind(&created_at)
        .bind(&updated_at)
        .bind(&ended_at)
        .execute(pool)
        .await
        .map_err(ladle_common::Error::Database)?;

        Ok(())
    })
    .await
}

/// Load an ingestion job from the database
pub async fn load_job(pool: &SqlitePool, job_id: Uuid) -> Result<Option<IngestJob>> {
    let job_id_str = job_id.to_string();

    let row = sqlx::query(
        r#"
        SELECT job_id, url, owner_uid, recipe_id, status,
               title, transcript, ocr_text, sufficiency, ocr_skipped,
               fallback_triggered, recipe_json, parse_errors,
               llm_model_used, llm_processing_ms, error_code, error_message,
               thumbnail_url, author_handle, stage_timings,
               created_at, updated_at, ended_at
        FROM ingest_jobs
        WHERE job_id = ?
        "#,
    )
    .bind(job_id_str)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(job_from_row(job_id, &row)?)),
        None => Ok(None),
    }
}

fn job_from_row(job_id: Uuid, row: &sqlx::sqlite::SqliteRow) -> Result<IngestJob> {
    let status: String = row.get("status");
    let status: JobStatus = serde_json::from_value(serde_json::Value::String(status))
        .map_err(|e| ladle_common::Error::Internal(format!("Failed to parse status: {}", e)))?;

    let ocr_text: String = row.get("ocr_text");
    let ocr_text: Vec<String> = serde_json::from_str(&ocr_text)
        .map_err(|e| ladle_common::Error::Internal(format!("Failed to parse ocr_text: {}", e)))?;

    let sufficiency: Option<String> = row.get("sufficiency");
    let sufficiency: Option<SufficiencyResult> = sufficiency
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| ladle_common::Error::Internal(format!("Failed to parse sufficiency: {}", e)))?;

    let recipe_json: Option<String> = row.get("recipe_json");
    let recipe_draft: Option<serde_json::Value> = recipe_json
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| {
            ladle_common::Error::Internal(format!("Failed to parse recipe draft: {}", e))
        })?;

    let parse_errors: String = row.get("parse_errors");
    let parse_errors: Vec<String> = serde_json::from_str(&parse_errors).map_err(|e| {
        ladle_common::Error::Internal(format!("Failed to parse parse_errors: {}", e))
    })?;

    let stage_timings: String = row.get("stage_timings");
    let stage_timings: StageTimings = serde_json::from_str(&stage_timings).map_err(|e| {
        ladle_common::Error::Internal(format!("Failed to parse stage_timings: {}", e))
    })?;

    let error_code: Option<String> = row.get("error_code");
    let error_code: Option<ErrorCode> = error_code
        .map(|s| serde_json::from_value(serde_json::Value::String(s)))
        .transpose()
        .map_err(|e| ladle_common::Error::Internal(format!("Failed to parse error_code: {}", e)))?;

    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| ladle_common::Error::Internal(format!("Failed to parse created_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    let updated_at: String = row.get("updated_at");
    let updated_at = chrono::DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| ladle_common::Error::Internal(format!("Failed to parse updated_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    let ended_at: Option<String> = row.get("ended_at");
    let ended_at = ended_at
        .map(|s| chrono::DateTime::parse_from_rfc3339(&s))
        .transpose()
        .map_err(|e| ladle_common::Error::Internal(format!("Failed to parse ended_at: {}", e)))?
        .map(|dt| dt.with_timezone(&chrono::Utc));

    Ok(IngestJob {
        job_id,
        url: row.get("url"),
        owner_uid: row.get("owner_uid"),
        recipe_id: row.get("recipe_id"),
        status,
        title: row.get("title"),
        transcript: row.get("transcript"),
        ocr_text,
        sufficiency,
        ocr_skipped: row.get::<Option<i64>, _>("ocr_skipped").map(|v| v != 0),
        fallback_triggered: row.get::<i64, _>("fallback_triggered") != 0,
        recipe_draft,
        parse_errors,
        llm_model_used: row.get("llm_model_used"),
        llm_processing_ms: row.get("llm_processing_ms"),
        error_code,
        error_message: row.get("error_message"),
        thumbnail_url: row.get("thumbnail_url"),
        author_handle: row.get("author_handle"),
        stage_timings,
        created_at,
        updated_at,
        ended_at,
    })
}

/// Cleanup stale ingestion jobs on startup
///
/// Any job not in a terminal status when ladle-vi starts was interrupted
/// by a previous shutdown and will never progress. Mark these as FAILED so
/// status queries report honestly instead of showing a forever-running job.
pub async fn mark_stale_jobs_failed(pool: &SqlitePool) -> Result<usize> {
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(&format!(
        r#"
        UPDATE ingest_jobs
        SET status = 'FAILED',
            error_code = '{}',
            error_message = 'Ingestion interrupted by service restart',
            updated_at = ?,
            ended_at = ?
        WHERE status NOT IN {}
        "#,
        ErrorCode::UnknownError.as_str(),
        TERMINAL_STATUSES
    ))
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() as usize)
}

/// Find a non-terminal job already ingesting the given URL, if any
pub async fn find_active_job_by_url(pool: &SqlitePool, url: &str) -> Result<Option<Uuid>> {
    let job_id: Option<String> = sqlx::query_scalar(&format!(
        "SELECT job_id FROM ingest_jobs WHERE url = ? AND status NOT IN {} LIMIT 1",
        TERMINAL_STATUSES
    ))
    .bind(url)
    .fetch_optional(pool)
    .await?;

    job_id
        .map(|s| {
            Uuid::parse_str(&s).map_err(|e| {
                ladle_common::Error::Internal(format!("Failed to parse job_id: {}", e))
            })
        })
        .transpose()
}

/// Count jobs currently in a non-terminal status
pub async fn count_active_jobs(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM ingest_jobs WHERE status NOT IN {}",
        TERMINAL_STATUSES
    ))
    .fetch_one(pool)
    .await?;

    Ok(count)
}
