//! Settings database operations
//!
//! Provides get/set accessors for the settings table following the
//! key-value pattern.

use ladle_common::{Error, Result};
use sqlx::{Pool, Sqlite};

#[cfg(test)]
use sqlx::SqlitePool;

/// Get the transcription service API key from the database
///
/// **Returns:** Some(key) if exists, None if not set
pub async fn get_asr_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, "asr_api_key").await
}

/// Set the transcription service API key in the database
pub async fn set_asr_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, "asr_api_key", key).await
}

/// Get the language model API key from the database
pub async fn get_llm_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, "llm_api_key").await
}

/// Set the language model API key in the database
pub async fn set_llm_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, "llm_api_key", key).await
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting failed: {}", e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Setup in-memory test database with settings table
    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();

        sqlx::query(
            "CREATE TABLE settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    #[tokio::test]
    async fn test_get_asr_api_key_exists() {
        let pool = setup_test_db().await;

        sqlx::query("INSERT INTO settings (key, value) VALUES ('asr_api_key', 'test_key_123')")
            .execute(&pool)
            .await
            .unwrap();

        let result = get_asr_api_key(&pool).await.unwrap();

        assert_eq!(result, Some("test_key_123".to_string()));
    }

    #[tokio::test]
    async fn test_get_asr_api_key_not_exists() {
        let pool = setup_test_db().await;

        let result = get_asr_api_key(&pool).await.unwrap();

        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_set_llm_api_key_update() {
        let pool = setup_test_db().await;

        set_llm_api_key(&pool, "old_key".to_string()).await.unwrap();
        set_llm_api_key(&pool, "new_key".to_string()).await.unwrap();

        let result = get_llm_api_key(&pool).await.unwrap();
        assert_eq!(result, Some("new_key".to_string()));

        // Verify no duplicate entries
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM settings WHERE key = 'llm_api_key'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1, "Should have exactly one entry after update");
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let pool = setup_test_db().await;

        set_asr_api_key(&pool, "asr_key".to_string()).await.unwrap();
        set_llm_api_key(&pool, "llm_key".to_string()).await.unwrap();

        assert_eq!(
            get_asr_api_key(&pool).await.unwrap(),
            Some("asr_key".to_string())
        );
        assert_eq!(
            get_llm_api_key(&pool).await.unwrap(),
            Some("llm_key".to_string())
        );
    }
}
