//! Settings API endpoints
//!
//! GET /settings returns masked API keys; POST /settings stores keys in
//! the database (authoritative) and syncs them to the TOML file as a
//! best-effort backup.

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::{ApiError, ApiResult, AppState};

/// POST /settings request; absent fields are left unchanged
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub asr_api_key: Option<String>,
    #[serde(default)]
    pub llm_api_key: Option<String>,
}

/// POST /settings response
#[derive(Debug, Serialize)]
pub struct UpdateSettingsResponse {
    pub success: bool,
    pub message: String,
}

/// GET /settings response; keys are masked to their last four characters
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub asr_api_key: Option<String>,
    pub llm_api_key: Option<String>,
}

/// Mask a secret, keeping only the last four characters
///
/// Counts characters, not bytes, so multibyte keys never split a
/// UTF-8 sequence.
fn mask_key(key: &str) -> String {
    let char_count = key.chars().count();
    if char_count <= 4 {
        "****".to_string()
    } else {
        let suffix: String = key.chars().skip(char_count - 4).collect();
        format!("****{}", suffix)
    }
}

/// GET /settings
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<SettingsResponse>> {
    let asr_api_key = crate::db::settings::get_asr_api_key(&state.db)
        .await?
        .map(|k| mask_key(&k));
    let llm_api_key = crate::db::settings::get_llm_api_key(&state.db)
        .await?
        .map(|k| mask_key(&k));

    Ok(Json(SettingsResponse {
        asr_api_key,
        llm_api_key,
    }))
}

/// POST /settings
///
/// Stores the provided keys in the database, then syncs them to the
/// TOML file. TOML write failures log a warning but do not fail the
/// request.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(payload): Json<UpdateSettingsRequest>,
) -> ApiResult<Json<UpdateSettingsResponse>> {
    if payload.asr_api_key.is_none() && payload.llm_api_key.is_none() {
        return Err(ApiError::BadRequest(
            "provide asr_api_key and/or llm_api_key".to_string(),
        ));
    }

    let mut synced = HashMap::new();

    if let Some(key) = payload.asr_api_key {
        if !crate::config::is_valid_key(&key) {
            return Err(ApiError::BadRequest(
                "asr_api_key cannot be empty or whitespace-only".to_string(),
            ));
        }
        crate::db::settings::set_asr_api_key(&state.db, key.clone()).await?;
        info!("ASR API key configured via API");
        synced.insert("asr_api_key".to_string(), key);
    }

    if let Some(key) = payload.llm_api_key {
        if !crate::config::is_valid_key(&key) {
            return Err(ApiError::BadRequest(
                "llm_api_key cannot be empty or whitespace-only".to_string(),
            ));
        }
        crate::db::settings::set_llm_api_key(&state.db, key.clone()).await?;
        info!("LLM API key configured via API");
        synced.insert("llm_api_key".to_string(), key);
    }

    match crate::config::sync_settings_to_toml(synced, &state.toml_path).await {
        Ok(()) => info!("Settings synced to TOML: {}", state.toml_path.display()),
        Err(e) => warn!("TOML sync failed (database write succeeded): {}", e),
    }

    Ok(Json(UpdateSettingsResponse {
        success: true,
        message: "Settings updated".to_string(),
    }))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/settings", get(get_settings).post(update_settings))
}
