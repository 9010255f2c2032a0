//! Fake LLM provider for testing.
//!
//! This provider returns deterministic responses based on prompt matching,
//! allowing tests to run without network access or API costs.

use super::{LlmError, LlmProvider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// A fake LLM provider for testing.
///
/// Responses are matched by checking if the prompt contains a registered
/// substring. If no match is found, returns a default response or error.
#[derive(Debug)]
pub struct FakeProvider {
    /// Map of prompt substring -> response
    responses: RwLock<HashMap<String, String>>,
    /// Default response if no match found
    default_response: Option<String>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            responses: RwLock::new(HashMap::new()),
            default_response: Some("{}".to_string()),
        }
    }
}

#[allow(dead_code)]
impl FakeProvider {
    /// Create a new FakeProvider with no registered responses.
    pub fn new() -> Self {
        Self {
            responses: RwLock::new(HashMap::new()),
            default_response: None,
        }
    }

    /// Create a FakeProvider that returns a specific response for prompts
    /// containing a substring.
    pub fn with_response(prompt_contains: &str, response: &str) -> Self {
        let mut provider = Self::new();
        provider.add_response(prompt_contains, response);
        provider
    }

    /// Add a response for prompts containing a specific substring.
    pub fn add_response(&mut self, prompt_contains: &str, response: &str) {
        self.responses
            .write()
            .unwrap()
            .insert(prompt_contains.to_string(), response.to_string());
    }

    /// Set the default response when no pattern matches.
    pub fn with_default_response(mut self, response: &str) -> Self {
        self.default_response = Some(response.to_string());
        self
    }

    /// Create a FakeProvider with standard responses for ingestion testing:
    /// a confident sufficiency verdict and a minimal valid recipe.
    pub fn with_ingest_responses() -> Self {
        let mut provider = Self::new();

        provider.add_response(
            "recipe analysis expert",
            r#"{
                "is_sufficient": true,
                "confidence_score": 0.9,
                "reasoning": "Narration covers ingredients and steps",
                "estimated_completeness": {
                    "ingredients": "complete",
                    "instructions": "complete",
                    "timing": "partial",
                    "measurements": "complete"
                }
            }"#,
        );

        provider.add_response(
            "recipe extraction expert",
            r#"{
                "title": "Garlic Butter Noodles",
                "description": "Quick garlic noodles from the video",
                "ingredients": [
                    {"name": "noodles", "quantity": "8 oz"},
                    {"name": "butter", "quantity": "3 tbsp"},
                    {"name": "garlic", "quantity": "4 cloves"}
                ],
                "instructions": [
                    "Boil the noodles until just tender, about 8 minutes",
                    "Melt butter, add garlic, toss with drained noodles"
                ],
                "cook_time_minutes": 15,
                "servings": 2
            }"#,
        );

        provider
    }
}

#[async_trait]
impl LlmProvider for FakeProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let responses = self.responses.read().unwrap();

        // Find first matching pattern (case-insensitive)
        let prompt_lower = prompt.to_lowercase();
        for (pattern, response) in responses.iter() {
            if prompt_lower.contains(&pattern.to_lowercase()) {
                return Ok(response.clone());
            }
        }

        // Return default or error
        match &self.default_response {
            Some(response) => Ok(response.clone()),
            None => Err(LlmError::RequestFailed(format!(
                "FakeProvider: No response configured for prompt (first 100 chars): {}",
                prompt.chars().take(100).collect::<String>()
            ))),
        }
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_provider_matching() {
        let provider = FakeProvider::with_response("hello", "world");
        let result = provider.complete("Say hello to the user").await.unwrap();
        assert_eq!(result, "world");
    }

    #[tokio::test]
    async fn test_fake_provider_no_match() {
        let provider = FakeProvider::new();
        let result = provider.complete("random prompt").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fake_provider_default_response() {
        let provider = FakeProvider::new().with_default_response("default");
        let result = provider.complete("random prompt").await.unwrap();
        assert_eq!(result, "default");
    }

    #[tokio::test]
    async fn test_fake_provider_no_match_with_multibyte_prompt() {
        let provider = FakeProvider::new();
        // Longer than the 100-char error excerpt, all multibyte
        let prompt = "рецепт ".repeat(30);
        let err = provider.complete(&prompt).await.unwrap_err();
        assert!(err.to_string().contains("рецепт"));
    }

    #[tokio::test]
    async fn test_ingest_responses() {
        let provider = FakeProvider::with_ingest_responses();

        let result = provider
            .complete("You are a recipe analysis expert. Judge this transcript")
            .await
            .unwrap();
        assert!(result.contains("is_sufficient"));

        let result = provider
            .complete("You are a recipe extraction expert. Structure this text")
            .await
            .unwrap();
        assert!(result.contains("Garlic Butter Noodles"));
    }
}
