//! Recipe record database operations
//!
//! Each job owns exactly one recipe row, written twice: an empty DRAFT
//! stub when the job is accepted, then a single finalizing UPDATE that
//! flips it ACTIVE with the structured content. The finalizing UPDATE
//! never touches `likes_count` or `saved_by`; those columns belong to
//! the social service and may change while ingestion runs.

use ladle_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{RecipeRecord, RecipeStatus};

/// Insert the empty DRAFT stub paired with a new job
pub async fn create_stub(pool: &SqlitePool, record: &RecipeRecord) -> Result<()> {
    let saved_by = serde_json::to_string(&record.saved_by)
        .map_err(|e| ladle_common::Error::Internal(format!("Failed to serialize saved_by: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO recipes (
            recipe_id, owner_uid, job_id, status, source_url,
            title, recipe_json, author_handle, thumbnail_url,
            likes_count, saved_by, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.recipe_id)
    .bind(&record.owner_uid)
    .bind(record.job_id.to_string())
    .bind(record.status.as_str())
    .bind(&record.source_url)
    .bind(&record.title)
    .bind(record.recipe_json.as_ref().map(|v| v.to_string()))
    .bind(&record.author_handle)
    .bind(&record.thumbnail_url)
    .bind(record.likes_count)
    .bind(&saved_by)
    .bind(record.created_at.to_rfc3339())
    .bind(record.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Finalize a recipe: write the structured content and flip DRAFT to ACTIVE
///
/// Fails with NotFound if the stub row is missing.
pub async fn finalize_recipe(
    pool: &SqlitePool,
    recipe_id: &str,
    title: &str,
    recipe_json: &serde_json::Value,
    author_handle: Option<&str>,
    thumbnail_url: Option<&str>,
) -> Result<()> {
    let recipe_json = serde_json::to_string(recipe_json).map_err(|e| {
        ladle_common::Error::Internal(format!("Failed to serialize recipe content: {}", e))
    })?;

    let result = sqlx::query(
        r#"
        UPDATE recipes
        SET status = 'ACTIVE',
            title = ?,
            recipe_json = ?,
            author_handle = ?,
            thumbnail_url = ?,
            updated_at = ?
        WHERE recipe_id = ?
        "#,
    )
    .bind(title)
    .bind(&recipe_json)
    .bind(author_handle)
    .bind(thumbnail_url)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(recipe_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ladle_common::Error::NotFound(format!(
            "Recipe not found: {}",
            recipe_id
        )));
    }

    Ok(())
}

/// Load a recipe record by id
pub async fn load_recipe(pool: &SqlitePool, recipe_id: &str) -> Result<Option<RecipeRecord>> {
    let row = sqlx::query(
        r#"
        SELECT recipe_id, owner_uid, job_id, status, source_url,
               title, recipe_json, author_handle, thumbnail_url,
               likes_count, saved_by, created_at, updated_at
        FROM recipes
        WHERE recipe_id = ?
        "#,
    )
    .bind(recipe_id)
    .fetch_optional(pool)
    .await?;

    let row = match row {
        Some(row) => row,
        None => return Ok(None),
    };

    let job_id: String = row.get("job_id");
    let job_id = Uuid::parse_str(&job_id)
        .map_err(|e| ladle_common::Error::Internal(format!("Failed to parse job_id: {}", e)))?;

    let status: String = row.get("status");
    let status: RecipeStatus = serde_json::from_value(serde_json::Value::String(status))
        .map_err(|e| ladle_common::Error::Internal(format!("Failed to parse status: {}", e)))?;

    let recipe_json: Option<String> = row.get("recipe_json");
    let recipe_json: Option<serde_json::Value> = recipe_json
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| {
            ladle_common::Error::Internal(format!("Failed to parse recipe content: {}", e))
        })?;

    let saved_by: String = row.get("saved_by");
    let saved_by: Vec<String> = serde_json::from_str(&saved_by)
        .map_err(|e| ladle_common::Error::Internal(format!("Failed to parse saved_by: {}", e)))?;

    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| ladle_common::Error::Internal(format!("Failed to parse created_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    let updated_at: String = row.get("updated_at");
    let updated_at = chrono::DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| ladle_common::Error::Internal(format!("Failed to parse updated_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    Ok(Some(RecipeRecord {
        recipe_id: row.get("recipe_id"),
        owner_uid: row.get("owner_uid"),
        job_id,
        status,
        source_url: row.get("source_url"),
        title: row.get("title"),
        recipe_json,
        author_handle: row.get("author_handle"),
        thumbnail_url: row.get("thumbnail_url"),
        likes_count: row.get("likes_count"),
        saved_by,
        created_at,
        updated_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    fn sample_stub() -> RecipeRecord {
        RecipeRecord::stub(
            format!("rec_{}", Uuid::new_v4()),
            "user-1".to_string(),
            Uuid::new_v4(),
            "https://www.tiktok.com/@cook/video/123".to_string(),
        )
    }

    #[tokio::test]
    async fn stub_round_trip() {
        let pool = setup_test_db().await;
        let stub = sample_stub();
        create_stub(&pool, &stub).await.unwrap();

        let loaded = load_recipe(&pool, &stub.recipe_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RecipeStatus::Draft);
        assert_eq!(loaded.owner_uid, "user-1");
        assert_eq!(loaded.likes_count, 0);
        assert!(loaded.title.is_none());
        assert!(loaded.recipe_json.is_none());
    }

    #[tokio::test]
    async fn finalize_flips_status_and_writes_content() {
        let pool = setup_test_db().await;
        let stub = sample_stub();
        create_stub(&pool, &stub).await.unwrap();

        let content = json!({"title": "Pasta", "ingredients": [], "instructions": []});
        finalize_recipe(&pool, &stub.recipe_id, "Pasta", &content, Some("@cook"), None)
            .await
            .unwrap();

        let loaded = load_recipe(&pool, &stub.recipe_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RecipeStatus::Active);
        assert_eq!(loaded.title.as_deref(), Some("Pasta"));
        assert_eq!(loaded.recipe_json.unwrap()["title"], "Pasta");
        assert_eq!(loaded.author_handle.as_deref(), Some("@cook"));
    }

    #[tokio::test]
    async fn finalize_preserves_social_counters() {
        let pool = setup_test_db().await;
        let stub = sample_stub();
        create_stub(&pool, &stub).await.unwrap();

        // Social service activity while ingestion is still running
        sqlx::query(
            "UPDATE recipes SET likes_count = 7, saved_by = '[\"fan-1\",\"fan-2\"]' WHERE recipe_id = ?",
        )
        .bind(&stub.recipe_id)
        .execute(&pool)
        .await
        .unwrap();

        let content = json!({"title": "Pasta"});
        finalize_recipe(&pool, &stub.recipe_id, "Pasta", &content, None, None)
            .await
            .unwrap();

        let loaded = load_recipe(&pool, &stub.recipe_id).await.unwrap().unwrap();
        assert_eq!(loaded.likes_count, 7);
        assert_eq!(loaded.saved_by, vec!["fan-1".to_string(), "fan-2".to_string()]);
    }

    #[tokio::test]
    async fn finalize_missing_stub_is_not_found() {
        let pool = setup_test_db().await;
        let err = finalize_recipe(&pool, "rec_missing", "x", &json!({}), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ladle_common::Error::NotFound(_)));
    }
}
