//! Recipe structuring stage
//!
//! Sends the gathered text sources (title, transcript, on-screen text)
//! to the LLM and parses the response into a validated [`RecipeDraft`].
//! Invalid output is re-prompted with the prior error and raw response
//! up to two times; transport failures get their own bounded retry with
//! linear backoff. Model and parsing problems never escalate past this
//! stage; the caller receives a draft-less outcome with the last parse
//! error instead.

use crate::models::{validate_draft, RecipeDraft};
use crate::services::llm::{LlmError, LlmProvider};
use crate::services::ocr_engine::{ingredient_candidates, FrameOcr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

const STRUCTURING_PROMPT: &str = r#"You are a recipe extraction expert. Convert the provided video data into a structured recipe.

Respond with a JSON object in this exact format:
{
    "title": "Recipe name",
    "description": "One or two sentence summary",
    "ingredients": [{"name": "ingredient", "quantity": "2 cups"}],
    "instructions": ["Step one", "Step two"],
    "prep_time_minutes": 10,
    "cook_time_minutes": 20,
    "servings": 4,
    "difficulty": 2,
    "tags": ["dinner"],
    "nutrition": {"calories": "350"}
}

Rules:
- title, ingredients, and instructions are required and must be non-empty
- Use null for any numeric field you cannot infer
- Keep quantities as written in the source ("1/2 cup", "a pinch")
- Do not invent ingredients or steps the data does not support"#;

/// What one structuring run produced.
#[derive(Debug, Clone)]
pub struct RefineOutcome {
    pub draft: Option<RecipeDraft>,
    pub parse_error: Option<String>,
    pub model_used: String,
    pub processing_ms: u64,
}

/// Drives the LLM structuring call with validation and transport retry.
pub struct Refiner {
    provider: Arc<dyn LlmProvider>,
    max_transport_attempts: u32,
    max_validation_retries: u32,
    transport_backoff: Duration,
}

impl Refiner {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            max_transport_attempts: 3,
            max_validation_retries: 2,
            transport_backoff: Duration::from_secs(1),
        }
    }

    /// Shrink the transport backoff, for tests that exercise failures.
    pub fn with_transport_backoff(mut self, backoff: Duration) -> Self {
        self.transport_backoff = backoff;
        self
    }

    /// Run structuring over the gathered sources.
    ///
    /// `Err` means the LLM was unreachable after transport retries; all
    /// other failures come back as an outcome without a draft.
    #[allow(clippy::too_many_arguments)]
    pub async fn refine(
        &self,
        title: &str,
        transcript: &str,
        ocr_frames: &[FrameOcr],
        source_url: &str,
        author_handle: Option<&str>,
        thumbnail_url: Option<&str>,
        job_id: Uuid,
    ) -> Result<RefineOutcome, LlmError> {
        let started = Instant::now();
        let mut ocr_text = prepare_ocr_text(ocr_frames);
        let candidates = ingredient_candidates(ocr_frames);
        if !candidates.is_empty() {
            ocr_text.push_str("\nIngredient candidates: ");
            ocr_text.push_str(&candidates.join(" | "));
        }
        let user_message = format!(
            "Title: {}\nTranscript: {}\nOCR Text: {}\nSource URL: {}\nAuthor: {}\nVideo Thumbnail: {}",
            title,
            transcript,
            ocr_text,
            source_url,
            author_handle.unwrap_or(""),
            thumbnail_url.unwrap_or("")
        );

        let mut prompt = format!("{}\n\n{}", STRUCTURING_PROMPT, user_message);
        let mut success: Option<RecipeDraft> = None;
        let mut best_invalid: Option<(RecipeDraft, String)> = None;
        let mut last_error: Option<String> = None;

        for attempt in 0..=self.max_validation_retries {
            let response = self.complete_with_transport_retry(&prompt).await?;
            match parse_and_validate(&response) {
                Ok(mut parsed) => {
                    parsed.attach_source_metadata(source_url, author_handle, job_id, thumbnail_url);
                    success = Some(parsed);
                    break;
                }
                Err((lenient, error)) => {
                    warn!(attempt = attempt + 1, error = %error, "Structuring response invalid");
                    if let Some(mut parsed) = lenient {
                        parsed.attach_source_metadata(
                            source_url,
                            author_handle,
                            job_id,
                            thumbnail_url,
                        );
                        best_invalid = Some((parsed, error.clone()));
                    }
                    if attempt < self.max_validation_retries {
                        prompt = format!(
                            "{}\n\n{}\n\n{}",
                            STRUCTURING_PROMPT,
                            user_message,
                            reprompt_message(&error, &response)
                        );
                    }
                    last_error = Some(error);
                }
            }
        }

        // Best result wins: a fully valid draft, else the latest draft that
        // at least parsed (carried with its validation error), else nothing.
        let (draft, parse_error) = match (success, best_invalid) {
            (Some(parsed), _) => (Some(parsed), None),
            (None, Some((parsed, error))) => (Some(parsed), Some(error)),
            (None, None) => (None, last_error),
        };

        let outcome = RefineOutcome {
            draft,
            parse_error,
            model_used: self.provider.model_name().to_string(),
            processing_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            parsed = outcome.draft.is_some(),
            model = %outcome.model_used,
            processing_ms = outcome.processing_ms,
            "Structuring finished"
        );
        Ok(outcome)
    }

    async fn complete_with_transport_retry(&self, prompt: &str) -> Result<String, LlmError> {
        let mut last_err = None;
        for attempt in 0..self.max_transport_attempts {
            match self.provider.complete(prompt).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_transport_attempts,
                        error = %e,
                        "LLM call failed"
                    );
                    last_err = Some(e);
                    if attempt + 1 < self.max_transport_attempts {
                        tokio::time::sleep(self.transport_backoff * (attempt + 1)).await;
                    }
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| LlmError::RequestFailed("no LLM attempts were made".to_string())))
    }
}

/// Format recognized on-screen text for the prompt, one line per frame.
pub fn prepare_ocr_text(frames: &[FrameOcr]) -> String {
    if frames.is_empty() {
        return "No OCR text detected.".to_string();
    }

    let mut parts = Vec::new();
    for frame in frames {
        let texts: Vec<&str> = frame
            .lines
            .iter()
            .map(|l| l.text.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if !texts.is_empty() {
            parts.push(format!(
                "Frame at {}s: {}",
                frame.timestamp_seconds,
                texts.join(" | ")
            ));
        }
    }

    if parts.is_empty() {
        "No readable text detected.".to_string()
    } else {
        parts.join("\n")
    }
}

/// One structuring attempt: extract JSON, parse, validate.
///
/// The error side carries a leniently deserialized draft when the JSON
/// parsed but failed validation, so callers can keep it as a
/// draft-with-errors.
fn parse_and_validate(response: &str) -> Result<RecipeDraft, (Option<RecipeDraft>, String)> {
    let json_str = extract_json_str(response);
    let value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| (None, format!("Invalid JSON format: {}", e)))?;
    validate_draft(&value).map_err(|errors| {
        let lenient = serde_json::from_value::<RecipeDraft>(value.clone()).ok();
        (lenient, errors.join("; "))
    })
}

/// Pull the JSON body out of a response, tolerating a ```json fence.
fn extract_json_str(response: &str) -> &str {
    if let Some(fence_pos) = response.find("```json") {
        let body_start = match response[fence_pos..].find('\n') {
            Some(offset) => fence_pos + offset + 1,
            None => fence_pos + "```json".len(),
        };
        match response[body_start..].find("```") {
            Some(end) => response[body_start..body_start + end].trim(),
            None => response[body_start..].trim(),
        }
    } else {
        response.trim()
    }
}

fn reprompt_message(error: &str, original_response: &str) -> String {
    format!(
        "Your previous response had an error: {}\n\nOriginal response:\n{}\n\nPlease fix the error and provide a valid JSON response that matches the schema exactly.",
        error, original_response
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::FakeProvider;
    use crate::services::ocr_engine::OcrLine;

    const VALID_RECIPE: &str = r#"{
        "title": "Garlic Butter Noodles",
        "ingredients": [
            {"name": "noodles", "quantity": "8 oz"},
            {"name": "butter", "quantity": "3 tbsp"},
            {"name": "garlic", "quantity": "4 cloves"}
        ],
        "instructions": [
            "Boil the noodles until just tender, about 8 minutes",
            "Melt butter, add garlic, toss with drained noodles"
        ]
    }"#;

    fn ocr_frame(timestamp: f64, texts: &[&str]) -> FrameOcr {
        FrameOcr {
            timestamp_seconds: timestamp,
            lines: texts
                .iter()
                .map(|t| OcrLine {
                    text: t.to_string(),
                    confidence: 0.9,
                    bbox: None,
                })
                .collect(),
        }
    }

    #[test]
    fn ocr_text_formats_one_line_per_frame() {
        let frames = vec![
            ocr_frame(0.5, &["1 cup flour", "2 eggs"]),
            ocr_frame(3.0, &["mix well"]),
        ];
        assert_eq!(
            prepare_ocr_text(&frames),
            "Frame at 0.5s: 1 cup flour | 2 eggs\nFrame at 3s: mix well"
        );
    }

    #[test]
    fn ocr_text_placeholders() {
        assert_eq!(prepare_ocr_text(&[]), "No OCR text detected.");
        let blank = vec![ocr_frame(1.0, &["  ", ""])];
        assert_eq!(prepare_ocr_text(&blank), "No readable text detected.");
    }

    #[test]
    fn json_extracted_from_fenced_response() {
        let response = "Here you go:\n```json\n{\"title\": \"x\"}\n```\nEnjoy!";
        assert_eq!(extract_json_str(response), "{\"title\": \"x\"}");
    }

    #[test]
    fn json_extracted_from_unterminated_fence() {
        let response = "```json\n{\"title\": \"x\"}";
        assert_eq!(extract_json_str(response), "{\"title\": \"x\"}");
    }

    #[test]
    fn plain_json_passes_through() {
        assert_eq!(extract_json_str("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn unparseable_response_is_a_parse_error() {
        let (lenient, err) = parse_and_validate("this is not json").unwrap_err();
        assert!(lenient.is_none());
        assert!(err.starts_with("Invalid JSON format:"));
    }

    #[test]
    fn invalid_draft_still_deserializes_leniently() {
        let (lenient, err) =
            parse_and_validate(r#"{"title": "Soup", "ingredients": []}"#).unwrap_err();
        assert_eq!(lenient.unwrap().title, "Soup");
        assert!(err.contains("ingredients"));
    }

    #[tokio::test]
    async fn happy_path_attaches_source_metadata() {
        let provider = Arc::new(FakeProvider::with_ingest_responses());
        let refiner = Refiner::new(provider);
        let job_id = Uuid::new_v4();

        let outcome = refiner
            .refine(
                "Garlic Butter Noodles",
                "melt the butter and add garlic",
                &[],
                "https://www.tiktok.com/@cook/video/123",
                Some("cook"),
                Some("https://example.com/thumb.jpg"),
                job_id,
            )
            .await
            .unwrap();

        let draft = outcome.draft.expect("expected a parsed draft");
        assert!(outcome.parse_error.is_none());
        assert_eq!(draft.title, "Garlic Butter Noodles");
        assert_eq!(
            draft.source_url.as_deref(),
            Some("https://www.tiktok.com/@cook/video/123")
        );
        assert_eq!(draft.author_handle.as_deref(), Some("cook"));
        assert_eq!(draft.is_public, Some(true));
        assert_eq!(draft.source_platform.as_deref(), Some("tiktok"));
        assert_eq!(draft.original_job_id.as_deref(), Some(job_id.to_string().as_str()));
        assert_eq!(outcome.model_used, "fake-model");
    }

    #[tokio::test]
    async fn invalid_first_response_recovers_on_reprompt() {
        let mut provider = FakeProvider::new();
        provider.add_response("Your previous response had an error", VALID_RECIPE);
        let provider = Arc::new(provider.with_default_response("not json at all"));

        let refiner = Refiner::new(provider);
        let outcome = refiner
            .refine(
                "Noodles",
                "transcript",
                &[],
                "https://example.com/v/1",
                None,
                None,
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        assert!(outcome.draft.is_some());
        assert!(outcome.parse_error.is_none());
    }

    #[tokio::test]
    async fn validation_failure_also_triggers_reprompt() {
        let mut provider = FakeProvider::new();
        provider.add_response("Your previous response had an error", VALID_RECIPE);
        // First response parses as JSON but fails validation
        let provider =
            Arc::new(provider.with_default_response(r#"{"title": "x", "ingredients": []}"#));

        let refiner = Refiner::new(provider);
        let outcome = refiner
            .refine(
                "Noodles",
                "transcript",
                &[],
                "https://example.com/v/1",
                None,
                None,
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        assert!(outcome.draft.is_some());
        assert!(outcome.parse_error.is_none());
    }

    #[tokio::test]
    async fn persistent_validation_failure_keeps_draft_with_errors() {
        // Every response parses as JSON but never validates
        let provider = Arc::new(
            FakeProvider::new().with_default_response(r#"{"title": "Soup", "ingredients": []}"#),
        );

        let refiner = Refiner::new(provider);
        let outcome = refiner
            .refine(
                "Soup",
                "transcript",
                &[],
                "https://example.com/v/1",
                Some("cook"),
                None,
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        let draft = outcome.draft.expect("lenient draft should survive");
        assert_eq!(draft.title, "Soup");
        // Source metadata still attached to the kept draft
        assert_eq!(draft.source_url.as_deref(), Some("https://example.com/v/1"));
        let error = outcome.parse_error.expect("validation error should be reported");
        assert!(error.contains("ingredients"));
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_parse_error() {
        let provider = Arc::new(FakeProvider::new().with_default_response("still not json"));
        let refiner = Refiner::new(provider);
        let outcome = refiner
            .refine(
                "Noodles",
                "transcript",
                &[],
                "https://example.com/v/1",
                None,
                None,
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        assert!(outcome.draft.is_none());
        let error = outcome.parse_error.expect("expected a parse error");
        assert!(error.starts_with("Invalid JSON format:"));
    }

    #[tokio::test]
    async fn transport_failure_escalates_after_retries() {
        // No responses and no default: every call errors
        let provider = Arc::new(FakeProvider::new());
        let refiner =
            Refiner::new(provider).with_transport_backoff(Duration::from_millis(1));
        let result = refiner
            .refine(
                "Noodles",
                "transcript",
                &[],
                "https://example.com/v/1",
                None,
                None,
                Uuid::new_v4(),
            )
            .await;

        assert!(result.is_err());
    }
}
