//! Data sufficiency analysis
//!
//! Asks the LLM whether the textual sources (title, transcript,
//! description) already contain enough information to structure a
//! recipe, so the pipeline can skip frame sampling and OCR entirely.
//!
//! This stage never fails the run: transport errors and unparseable
//! responses both degrade to a "not sufficient" verdict, which makes
//! the pipeline fall through to OCR, the conservative choice.

use crate::models::{Completeness, CompletenessEstimate, SufficiencyResult};
use crate::services::llm::LlmProvider;
use std::sync::Arc;
use tracing::{error, info};

const ANALYSIS_PROMPT: &str = r#"You are a recipe analysis expert. Your task is to evaluate whether the provided data contains enough information to create a complete recipe without needing additional visual text extraction (OCR).

Analyze the following data and determine if it's sufficient to create a structured recipe with:
- At least 3 ingredients with measurements
- At least 2 cooking instruction steps
- Basic timing information (prep/cook time)

Respond with a JSON object in this exact format:
{
    "is_sufficient": true/false,
    "confidence_score": 0.0-1.0,
    "reasoning": "Brief explanation of your decision",
    "estimated_completeness": {
        "ingredients": "complete/partial/missing",
        "instructions": "complete/partial/missing",
        "timing": "complete/partial/missing",
        "measurements": "complete/partial/missing"
    }
}

Be conservative - only mark as sufficient if you're confident a good recipe can be created from the available data alone."#;

/// Judges whether text sources alone can feed the structuring stage.
pub struct SufficiencyAnalyzer {
    provider: Arc<dyn LlmProvider>,
}

impl SufficiencyAnalyzer {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Analyze the available text sources.
    ///
    /// Returns `no_data` when every source is blank, and an
    /// `analysis_failed` verdict (not an error) when the LLM call fails.
    pub async fn analyze(
        &self,
        title: &str,
        transcript: &str,
        description: &str,
    ) -> SufficiencyResult {
        if title.trim().is_empty() && transcript.trim().is_empty() && description.trim().is_empty()
        {
            return SufficiencyResult::no_data();
        }

        let user_message = format!(
            "Title: {}\nTranscript: {}\nDescription: {}\n\nPlease analyze this data for recipe completeness.",
            title, transcript, description
        );
        let prompt = format!("{}\n\n{}", ANALYSIS_PROMPT, user_message);

        let result = match self.provider.complete(&prompt).await {
            Ok(response) => parse_analysis_response(&response),
            Err(e) => {
                error!(error = %e, "Sufficiency analysis call failed");
                SufficiencyResult::analysis_failed(&e.to_string())
            }
        };

        info!(
            is_sufficient = result.is_sufficient,
            confidence = result.confidence_score,
            "Data sufficiency analysis"
        );
        result
    }
}

/// Parse the LLM's verdict, tolerating a ```json fence around it.
///
/// Non-JSON responses fall back to a keyword scan of the text: a
/// response containing "sufficient" or "yes" is taken as a sufficient
/// verdict at confidence 0.5, anything else as insufficient at 0.0.
pub fn parse_analysis_response(response: &str) -> SufficiencyResult {
    let mut clean = response.trim();
    clean = clean.strip_prefix("```json").unwrap_or(clean);
    clean = clean.strip_suffix("```").unwrap_or(clean);

    match serde_json::from_str::<serde_json::Value>(clean) {
        Ok(data) => {
            let estimated_completeness = data
                .get("estimated_completeness")
                .and_then(|v| serde_json::from_value::<CompletenessEstimate>(v.clone()).ok())
                .unwrap_or_else(|| CompletenessEstimate::uniform(Completeness::Unknown));
            SufficiencyResult {
                is_sufficient: data
                    .get("is_sufficient")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
                confidence_score: data
                    .get("confidence_score")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0),
                reasoning: data
                    .get("reasoning")
                    .and_then(|v| v.as_str())
                    .unwrap_or("No reasoning provided")
                    .to_string(),
                estimated_completeness,
            }
        }
        Err(e) => {
            error!(error = %e, raw = response, "Failed to parse sufficiency response");
            let lower = response.to_lowercase();
            let is_sufficient = lower.contains("sufficient") || lower.contains("yes");
            let truncated: String = response.chars().take(200).collect();
            SufficiencyResult {
                is_sufficient,
                confidence_score: if is_sufficient { 0.5 } else { 0.0 },
                reasoning: format!("Parsed from text response: {}...", truncated),
                estimated_completeness: CompletenessEstimate::uniform(Completeness::Unknown),
            }
        }
    }
}
