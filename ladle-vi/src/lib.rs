//! ladle-vi library interface
//!
//! Exposes the API router, pipeline, and supporting modules for
//! integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use ladle_common::config::TomlConfig;
use ladle_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::IngestPipeline;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Loaded service configuration
    pub config: Arc<TomlConfig>,
    /// Shared pipeline instance; each accepted job runs on it in a
    /// spawned task
    pub pipeline: Arc<IngestPipeline>,
    /// TOML config file that settings updates are synced to
    pub toml_path: Arc<std::path::PathBuf>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        config: TomlConfig,
        pipeline: IngestPipeline,
        toml_path: std::path::PathBuf,
    ) -> Self {
        Self {
            db,
            event_bus,
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            toml_path: Arc::new(toml_path),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::ingest_routes())
        .route("/ingest/events", get(api::ingest_event_stream))
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .with_state(state)
}
