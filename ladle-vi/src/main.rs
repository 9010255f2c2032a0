//! ladle-vi - Video Ingest Service
//!
//! **Module Identity:**
//! - Name: ladle-vi (Video Ingest)
//! - Port: 5741
//!
//! Turns short-form cooking videos into structured recipe drafts:
//! download, transcription, conditional OCR, LLM structuring, and
//! persistence, exposed over HTTP REST + SSE.

use anyhow::Result;
use ladle_common::events::EventBus;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use ladle_vi::services::{IngestPipeline, TesseractOcr};
use ladle_vi::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load TOML config first so the log level honors it
    let toml_path = ladle_common::config::default_config_path("ladle-vi")
        .unwrap_or_else(|| PathBuf::from("ladle-vi.toml"));
    let config = ladle_common::config::load_toml_config(&toml_path)?;

    let level = match config.logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting ladle-vi (Video Ingest) service");
    info!("Port: 5741");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        "Build: {} ({}, {})",
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );

    // Resolve and initialize the root data folder
    let resolver = ladle_common::config::RootFolderResolver::new("ladle-vi");
    let root_folder = resolver.resolve();

    let initializer = ladle_common::config::RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());

    let db_pool = ladle_vi::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Jobs left mid-run by a previous process can never resume
    let recovered = ladle_vi::db::jobs::mark_stale_jobs_failed(&db_pool).await?;
    if recovered > 0 {
        warn!("Marked {} interrupted ingestion job(s) as failed", recovered);
    }

    // API keys: database is authoritative, ENV/TOML migrate in on first run
    let asr_api_key = match ladle_vi::config::resolve_asr_api_key(&db_pool, &config).await {
        Ok(key) => {
            if let Err(e) =
                ladle_vi::config::ensure_key_in_database(&db_pool, "asr_api_key", &key, &toml_path)
                    .await
            {
                warn!("ASR API key migration failed: {}", e);
            }
            key
        }
        Err(e) => {
            warn!("{}", e);
            String::new()
        }
    };
    let llm_api_key = match ladle_vi::config::resolve_llm_api_key(&db_pool, &config).await {
        Ok(key) => {
            if let Err(e) =
                ladle_vi::config::ensure_key_in_database(&db_pool, "llm_api_key", &key, &toml_path)
                    .await
            {
                warn!("LLM API key migration failed: {}", e);
            }
            key
        }
        Err(e) => {
            warn!("{}", e);
            String::new()
        }
    };

    // OCR is optional at runtime; warn early if the binary is missing
    if !TesseractOcr::new(config.tools.tesseract_path.clone())
        .check_available()
        .await
    {
        warn!("OCR engine unavailable, jobs will degrade to transcript-only");
    }

    let event_bus = EventBus::new(100);
    info!("Event bus initialized");

    let work_root = initializer.work_root();
    let pipeline = IngestPipeline::new(
        db_pool.clone(),
        event_bus.clone(),
        &config,
        work_root,
        asr_api_key,
        llm_api_key,
    );

    let state = AppState::new(db_pool, event_bus, config, pipeline, toml_path);
    let app = ladle_vi::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:5741").await?;
    info!("Listening on http://127.0.0.1:5741");
    info!("Health check: http://127.0.0.1:5741/health");

    axum::serve(listener, app).await?;

    Ok(())
}
