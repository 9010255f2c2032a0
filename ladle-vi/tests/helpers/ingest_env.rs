//! Shared test environment builders
//!
//! Pipeline tests run against a file-backed SQLite database inside a
//! temp directory; the same directory doubles as the pipeline work
//! root, so one `TestEnv` keeps everything alive for a test.

use ladle_common::config::{PipelineConfig, TomlConfig};
use ladle_common::events::EventBus;
use ladle_vi::models::{IngestJob, RecipeRecord};
use ladle_vi::services::llm::FakeProvider;
use ladle_vi::services::IngestPipeline;
use ladle_vi::AppState;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

use super::fakes::{
    FakeAudioExtractor, FakeFetcher, FakeFrameSampler, FakeTextRecognizer, FakeTranscriber,
};

/// Database, event bus, and the temp directory that keeps both alive.
pub struct TestEnv {
    pub temp: tempfile::TempDir,
    pub db: SqlitePool,
    pub event_bus: EventBus,
}

pub async fn test_env() -> TestEnv {
    let temp = tempfile::tempdir().expect("create temp dir");
    let db = ladle_vi::db::init_database_pool(&temp.path().join("ladle-test.db"))
        .await
        .expect("initialize test database");
    TestEnv {
        temp,
        db,
        event_bus: EventBus::new(100),
    }
}

/// Concrete fake adapters, kept unboxed so tests can read call counters
/// after a run.
pub struct TestAdapters {
    pub fetcher: Arc<FakeFetcher>,
    pub audio: Arc<FakeAudioExtractor>,
    pub transcriber: Arc<FakeTranscriber>,
    pub sampler: Arc<FakeFrameSampler>,
    pub recognizer: Arc<FakeTextRecognizer>,
}

/// Adapters for a typical short cooking video: source metadata, the
/// given narration transcript, and two frames of on-screen text.
pub fn test_adapters(transcript: &str) -> TestAdapters {
    TestAdapters {
        fetcher: Arc::new(FakeFetcher {
            title: Some("Garlic butter noodles in 15 minutes".to_string()),
            description: Some("The easiest weeknight dinner".to_string()),
            uploader: Some("@testchef".to_string()),
            thumbnail_url: Some("https://cdn.example.com/thumb.jpg".to_string()),
            ..Default::default()
        }),
        audio: Arc::new(FakeAudioExtractor::default()),
        transcriber: Arc::new(FakeTranscriber {
            transcript: transcript.to_string(),
            ..Default::default()
        }),
        sampler: Arc::new(FakeFrameSampler {
            timestamps: vec![1.5, 4.0],
            ..Default::default()
        }),
        recognizer: Arc::new(FakeTextRecognizer {
            texts: vec![
                "8 oz spaghetti, 4 tbsp butter".to_string(),
                "6 cloves garlic, minced".to_string(),
            ],
            ..Default::default()
        }),
    }
}

/// Pipeline wired to the fakes, with backoffs shrunk so retry paths
/// finish in milliseconds.
pub fn build_pipeline(
    env: &TestEnv,
    adapters: &TestAdapters,
    provider: FakeProvider,
) -> IngestPipeline {
    IngestPipeline::with_adapters(
        env.db.clone(),
        env.event_bus.clone(),
        PipelineConfig::default(),
        env.temp.path().join("work"),
        adapters.fetcher.clone(),
        adapters.audio.clone(),
        adapters.transcriber.clone(),
        adapters.sampler.clone(),
        adapters.recognizer.clone(),
        Arc::new(provider),
    )
    .with_backoffs(Duration::from_millis(1), Duration::from_millis(1))
}

/// Full HTTP app over a fake-backed pipeline, for handler tests.
pub fn test_app(env: &TestEnv, adapters: &TestAdapters, provider: FakeProvider) -> axum::Router {
    let pipeline = build_pipeline(env, adapters, provider);
    // Settings sync writes inside the temp dir, never the user's config
    let state = AppState::new(
        env.db.clone(),
        env.event_bus.clone(),
        TomlConfig::default(),
        pipeline,
        env.temp.path().join("ladle-vi.toml"),
    );
    ladle_vi::build_router(state)
}

/// Registers a job plus its DRAFT recipe stub, the way the start
/// endpoint does before handing the job to the pipeline.
pub async fn register_job(db: &SqlitePool, url: &str, owner_uid: &str) -> IngestJob {
    let job = IngestJob::new(url.to_string(), owner_uid.to_string());
    let stub = RecipeRecord::stub(
        job.recipe_id.clone(),
        job.owner_uid.clone(),
        job.job_id,
        job.url.clone(),
    );
    ladle_vi::db::recipes::create_stub(db, &stub)
        .await
        .expect("create recipe stub");
    ladle_vi::db::jobs::save_job(db, &job)
        .await
        .expect("save job");
    job
}
