//! Configuration resolution for ladle-vi
//!
//! Provides multi-tier API key resolution with Database → ENV → TOML priority.

use ladle_common::config::TomlConfig;
use ladle_common::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Resolve the speech-to-text API key from 3-tier configuration
///
/// **Priority:** Database → ENV → TOML
pub async fn resolve_asr_api_key(db: &Pool<Sqlite>, toml_config: &TomlConfig) -> Result<String> {
    let db_key = crate::db::settings::get_asr_api_key(db).await?;
    let env_key = std::env::var("LADLE_ASR_API_KEY").ok();
    let toml_key = toml_config.asr_api_key.clone();

    resolve_three_tier(
        "Transcription API key",
        db_key,
        env_key,
        toml_key,
        "Transcription API key not configured. Please configure using one of:\n\
         1. Web UI: http://localhost:5741/settings\n\
         2. Environment: LADLE_ASR_API_KEY=your-key-here\n\
         3. TOML config: ~/.config/ladle/ladle-vi.toml (asr_api_key = \"your-key\")",
    )
}

/// Resolve the language model API key from 3-tier configuration
///
/// **Priority:** Database → ENV → TOML
pub async fn resolve_llm_api_key(db: &Pool<Sqlite>, toml_config: &TomlConfig) -> Result<String> {
    let db_key = crate::db::settings::get_llm_api_key(db).await?;
    let env_key = std::env::var("LADLE_LLM_API_KEY").ok();
    let toml_key = toml_config.llm_api_key.clone();

    resolve_three_tier(
        "Language model API key",
        db_key,
        env_key,
        toml_key,
        "Language model API key not configured. Please configure using one of:\n\
         1. Web UI: http://localhost:5741/settings\n\
         2. Environment: LADLE_LLM_API_KEY=your-key-here\n\
         3. TOML config: ~/.config/ladle/ladle-vi.toml (llm_api_key = \"your-key\")",
    )
}

/// Shared 3-tier resolution: database is authoritative, then environment,
/// then TOML. Warns when the key appears in more than one place.
fn resolve_three_tier(
    label: &str,
    db_key: Option<String>,
    env_key: Option<String>,
    toml_key: Option<String>,
    not_configured: &str,
) -> Result<String> {
    let mut sources = Vec::new();
    if db_key.as_deref().map(is_valid_key).unwrap_or(false) {
        sources.push("database");
    }
    if env_key.as_deref().map(is_valid_key).unwrap_or(false) {
        sources.push("environment");
    }
    if toml_key.as_deref().map(is_valid_key).unwrap_or(false) {
        sources.push("TOML");
    }

    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using database (highest priority).",
            label,
            sources.join(", ")
        );
    }

    if let Some(key) = db_key {
        if is_valid_key(&key) {
            info!("{} loaded from database", label);
            return Ok(key);
        }
    }

    if let Some(key) = env_key {
        if is_valid_key(&key) {
            info!("{} loaded from environment variable", label);
            return Ok(key);
        }
    }

    if let Some(key) = toml_key {
        if is_valid_key(&key) {
            info!("{} loaded from TOML config", label);
            return Ok(key);
        }
    }

    Err(Error::Config(not_configured.to_string()))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

// ============================================================================
// Settings Sync and Write-Back
// ============================================================================

/// Sync settings from database to TOML file
///
/// HashMap keys: "asr_api_key", "llm_api_key"
pub async fn sync_settings_to_toml(
    settings: HashMap<String, String>,
    toml_path: &Path,
) -> Result<()> {
    // Read existing TOML (or use defaults)
    let mut config: TomlConfig = if toml_path.exists() {
        let content = std::fs::read_to_string(toml_path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?
    } else {
        TomlConfig::default()
    };

    // Update fields from HashMap
    if let Some(key) = settings.get("asr_api_key") {
        config.asr_api_key = Some(key.clone());
    }
    if let Some(key) = settings.get("llm_api_key") {
        config.llm_api_key = Some(key.clone());
    }

    // Write atomically (best-effort)
    match ladle_common::config::write_toml_config(&config, toml_path) {
        Ok(()) => {
            info!("Settings synced to TOML: {}", toml_path.display());
            Ok(())
        }
        Err(e) => {
            warn!("TOML write failed (database write succeeded): {}", e);
            Ok(()) // Graceful degradation
        }
    }
}

/// Migrate a freshly resolved key into the database if it is not
/// already there. Called at startup so keys supplied via ENV or TOML
/// become authoritative on first run.
pub async fn ensure_key_in_database(
    db: &Pool<Sqlite>,
    setting: &str,
    resolved: &str,
    toml_path: &Path,
) -> Result<()> {
    let db_key = match setting {
        "asr_api_key" => crate::db::settings::get_asr_api_key(db).await?,
        "llm_api_key" => crate::db::settings::get_llm_api_key(db).await?,
        other => {
            return Err(Error::Config(format!("Unknown setting: {}", other)));
        }
    };
    if db_key.as_deref().map(is_valid_key).unwrap_or(false) {
        return Ok(());
    }

    let env_var = match setting {
        "asr_api_key" => "LADLE_ASR_API_KEY",
        _ => "LADLE_LLM_API_KEY",
    };
    let source = if std::env::var(env_var)
        .ok()
        .as_deref()
        .map(is_valid_key)
        .unwrap_or(false)
    {
        "environment"
    } else {
        "TOML"
    };

    migrate_key_to_database(setting, resolved.to_string(), source, db, toml_path).await
}

/// Perform auto-migration of a key found in ENV/TOML into the database
///
/// `setting` is one of "asr_api_key" or "llm_api_key".
pub async fn migrate_key_to_database(
    setting: &str,
    key: String,
    source: &str,
    db: &Pool<Sqlite>,
    toml_path: &Path,
) -> Result<()> {
    // Write to database (authoritative)
    match setting {
        "asr_api_key" => crate::db::settings::set_asr_api_key(db, key.clone()).await?,
        "llm_api_key" => crate::db::settings::set_llm_api_key(db, key.clone()).await?,
        other => {
            return Err(Error::Config(format!("Unknown setting: {}", other)));
        }
    }

    // Write to TOML if source was ENV (backup)
    if source == "environment" {
        let mut settings = HashMap::new();
        settings.insert(setting.to_string(), key);
        sync_settings_to_toml(settings, toml_path).await?;
    }

    info!("{} migrated from {} to database", setting, source);
    Ok(())
}
