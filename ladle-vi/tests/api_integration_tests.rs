//! HTTP API integration tests
//!
//! Exercises the full router over a fake-backed pipeline: job
//! submission through background completion, the status projection,
//! settings, and the SSE stream.

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use helpers::{test_adapters, test_app, test_env};
use http_body_util::BodyExt;
use ladle_vi::models::{
    CompletenessEstimate, IngestJob, JobStatus, RecipeStatus, SufficiencyResult,
};
use ladle_vi::services::llm::FakeProvider;
use serde_json::json;
use std::time::Duration;
use tower::util::ServiceExt;

const NARRATION: &str = "Boil eight ounces of spaghetti until just tender. \
    Melt four tablespoons of butter with six cloves of minced garlic, \
    then toss everything together and serve hot.";

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

/// Poll the status endpoint until the background run settles.
async fn poll_until_terminal(app: &axum::Router, job_id: &str) -> serde_json::Value {
    for _ in 0..300 {
        let response = app
            .clone()
            .oneshot(get(&format!("/ingest/status/{}", job_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        let status = json["status"].as_str().unwrap_or_default();
        if matches!(
            status,
            "COMPLETED"
                | "FAILED"
                | "DRAFT_PARSED"
                | "DRAFT_PARSED_WITH_ERRORS"
                | "LLM_FAILED_BUT_CONTINUED"
        ) {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never reached a terminal status", job_id);
}

#[tokio::test]
async fn test_health_endpoint() {
    let env = test_env().await;
    let adapters = test_adapters(NARRATION);
    let app = test_app(&env, &adapters, FakeProvider::with_ingest_responses());

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "ladle-vi");
    assert!(json["uptime_seconds"].is_number());
    assert_eq!(json["active_jobs"], 0);
}

#[tokio::test]
async fn test_start_ingest_runs_to_completion() {
    let env = test_env().await;
    let adapters = test_adapters(NARRATION);
    let app = test_app(&env, &adapters, FakeProvider::with_ingest_responses());

    let request_body = json!({
        "url": "https://www.tiktok.com/@testchef/video/601",
        "owner_uid": "user-api-1"
    });
    let response = app
        .clone()
        .oneshot(post_json("/ingest/start", &request_body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let accepted = json_body(response).await;
    let job_id = accepted["job_id"].as_str().expect("job_id").to_string();
    let recipe_id = accepted["recipe_id"].as_str().expect("recipe_id");
    assert!(recipe_id.starts_with("rec_"));
    assert_eq!(accepted["status"], "QUEUED");
    assert!(accepted["created_at"].is_string());

    // Both rows exist before the accept response is returned
    let parsed_id = uuid::Uuid::parse_str(&job_id).unwrap();
    let job = ladle_vi::db::jobs::load_job(&env.db, parsed_id)
        .await
        .unwrap()
        .expect("job row");
    assert_eq!(job.recipe_id, recipe_id);
    assert!(ladle_vi::db::recipes::load_recipe(&env.db, recipe_id)
        .await
        .unwrap()
        .is_some());

    // The spawned pipeline finishes against the fakes
    let status = poll_until_terminal(&app, &job_id).await;
    assert_eq!(status["status"], "COMPLETED");
    assert_eq!(status["ocr_skipped"], true);
    assert_eq!(status["fallback_triggered"], false);
    assert_eq!(status["has_parse_errors"], false);
    assert_eq!(status["llm_model_used"], "fake-model");
    assert!(status["llm_processing_time_seconds"].is_number());
    assert_eq!(status["recipe_json"]["title"], "Garlic Butter Noodles");
    assert_eq!(status["recipe_stats"]["ingredients_count"], 3);
    assert_eq!(status["recipe_stats"]["instructions_count"], 2);
    assert_eq!(status["sufficiency"]["is_sufficient"], true);
    assert!(status["sufficiency"]["threshold"].as_f64().unwrap() > 0.0);
    assert!(status["stage_timings"]["total_pipeline"].is_number());
    assert!(status["ended_at"].is_string());

    let record = ladle_vi::db::recipes::load_recipe(&env.db, recipe_id)
        .await
        .unwrap()
        .expect("recipe row");
    assert_eq!(record.status, RecipeStatus::Active);
}

#[tokio::test]
async fn test_start_ingest_rejects_non_http_url() {
    let env = test_env().await;
    let adapters = test_adapters(NARRATION);
    let app = test_app(&env, &adapters, FakeProvider::with_ingest_responses());

    let request_body = json!({
        "url": "ftp://example.com/videos/1",
        "owner_uid": "user-api-1"
    });
    let response = app
        .oneshot(post_json("/ingest/start", &request_body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_start_ingest_rejects_blank_owner() {
    let env = test_env().await;
    let adapters = test_adapters(NARRATION);
    let app = test_app(&env, &adapters, FakeProvider::with_ingest_responses());

    let request_body = json!({
        "url": "https://www.tiktok.com/@testchef/video/602",
        "owner_uid": "   "
    });
    let response = app
        .oneshot(post_json("/ingest/start", &request_body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_start_ingest_rejects_url_already_in_flight() {
    let env = test_env().await;
    let adapters = test_adapters(NARRATION);
    let app = test_app(&env, &adapters, FakeProvider::with_ingest_responses());

    let url = "https://www.tiktok.com/@testchef/video/604";
    let mut in_flight = IngestJob::new(url.to_string(), "user-api-3".to_string());
    in_flight.transition_to(JobStatus::Transcribing);
    ladle_vi::db::jobs::save_job(&env.db, &in_flight).await.unwrap();

    let response = app
        .oneshot(post_json(
            "/ingest/start",
            &json!({"url": url, "owner_uid": "user-api-4"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_status_not_found() {
    let env = test_env().await;
    let adapters = test_adapters(NARRATION);
    let app = test_app(&env, &adapters, FakeProvider::with_ingest_responses());

    let response = app
        .oneshot(get("/ingest/status/00000000-0000-0000-0000-000000000000"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_rejects_malformed_job_id() {
    let env = test_env().await;
    let adapters = test_adapters(NARRATION);
    let app = test_app(&env, &adapters, FakeProvider::with_ingest_responses());

    let response = app
        .oneshot(get("/ingest/status/not-a-uuid"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_projection_shape() {
    let env = test_env().await;
    let adapters = test_adapters(NARRATION);
    let app = test_app(&env, &adapters, FakeProvider::with_ingest_responses());

    // Job row crafted directly, as the pipeline would leave it after a
    // draft parse with one validation complaint
    let mut job = IngestJob::new(
        "https://www.tiktok.com/@testchef/video/603".to_string(),
        "user-api-2".to_string(),
    );
    job.title = Some("Garlic Pasta".to_string());
    job.transcript = Some(NARRATION.to_string());
    job.ocr_skipped = Some(false);
    job.sufficiency = Some(SufficiencyResult {
        is_sufficient: false,
        confidence_score: 0.55,
        reasoning: "Quantities only partially narrated".to_string(),
        estimated_completeness: CompletenessEstimate::default(),
    });
    job.recipe_draft = Some(json!({
        "title": "Garlic Pasta",
        "ingredients": [
            {"name": "pasta", "quantity": "8 oz"},
            {"name": "garlic", "quantity": "6 cloves"}
        ],
        "instructions": ["Boil pasta", "Toss with garlic butter"],
        "servings": 2
    }));
    job.parse_errors = vec!["difficulty must be between 1 and 5".to_string()];
    job.llm_model_used = Some("gpt-4o-mini".to_string());
    job.llm_processing_ms = Some(2500);
    job.transition_to(JobStatus::DraftParsedWithErrors);
    ladle_vi::db::jobs::save_job(&env.db, &job).await.unwrap();

    let response = app
        .oneshot(get(&format!("/ingest/status/{}", job.job_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "DRAFT_PARSED_WITH_ERRORS");
    assert_eq!(json["owner_uid"], "user-api-2");
    assert_eq!(json["has_parse_errors"], true);
    assert_eq!(json["parse_errors"][0], "difficulty must be between 1 and 5");
    assert_eq!(json["llm_processing_time_seconds"], 2.5);
    assert_eq!(json["sufficiency"]["confidence_score"], 0.55);
    assert_eq!(json["sufficiency"]["threshold"], 0.7);
    assert_eq!(json["recipe_stats"]["ingredients_count"], 2);
    assert_eq!(json["recipe_stats"]["has_servings"], true);
    assert_eq!(json["recipe_stats"]["has_cook_time"], false);
    assert!(json["ended_at"].is_string());
}

#[tokio::test]
async fn test_settings_update_and_masked_readback() {
    let env = test_env().await;
    let adapters = test_adapters(NARRATION);
    let app = test_app(&env, &adapters, FakeProvider::with_ingest_responses());

    let response = app
        .clone()
        .oneshot(post_json(
            "/settings",
            &json!({"llm_api_key": "sk-test-abcdef123456"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);

    let response = app.clone().oneshot(get("/settings")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["llm_api_key"], "****3456");
    assert!(json["asr_api_key"].is_null());

    // No keys at all
    let response = app
        .clone()
        .oneshot(post_json("/settings", &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Blank key
    let response = app
        .oneshot(post_json("/settings", &json!({"asr_api_key": "   "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_settings_masked_readback_with_multibyte_key() {
    let env = test_env().await;
    let adapters = test_adapters(NARRATION);
    let app = test_app(&env, &adapters, FakeProvider::with_ingest_responses());

    let response = app
        .clone()
        .oneshot(post_json("/settings", &json!({"llm_api_key": "ключ1"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/settings")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["llm_api_key"], "****люч1");

    // The sync landed in the per-test config file, not the user's
    assert!(env.temp.path().join("ladle-vi.toml").exists());
}

#[tokio::test]
async fn test_sse_endpoint_connection() {
    let env = test_env().await;
    let adapters = test_adapters(NARRATION);
    let app = test_app(&env, &adapters, FakeProvider::with_ingest_responses());

    let response = app.oneshot(get("/ingest/events")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
}
