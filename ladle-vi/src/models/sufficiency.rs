//! Sufficiency analysis result types
//!
//! The analyzer asks the language model whether the transcript alone
//! carries enough recipe detail to skip on-screen text extraction. Model
//! output is lenient JSON; every field defaults so a partial answer still
//! parses.

use serde::{Deserialize, Serialize};

/// Per-component completeness rating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    Complete,
    Partial,
    Missing,
    #[default]
    Unknown,
}

impl Completeness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Completeness::Complete => "complete",
            Completeness::Partial => "partial",
            Completeness::Missing => "missing",
            Completeness::Unknown => "unknown",
        }
    }
}

/// Completeness ratings for the four recipe components
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletenessEstimate {
    #[serde(default)]
    pub ingredients: Completeness,
    #[serde(default)]
    pub instructions: Completeness,
    #[serde(default)]
    pub timing: Completeness,
    #[serde(default)]
    pub measurements: Completeness,
}

impl CompletenessEstimate {
    /// All four components at the same rating
    pub fn uniform(rating: Completeness) -> Self {
        Self {
            ingredients: rating,
            instructions: rating,
            timing: rating,
            measurements: rating,
        }
    }
}

/// Verdict on whether the transcript alone suffices for structuring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SufficiencyResult {
    #[serde(default)]
    pub is_sufficient: bool,
    #[serde(default)]
    pub confidence_score: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub estimated_completeness: CompletenessEstimate,
}

impl SufficiencyResult {
    /// Conservative verdict used when the analysis call itself fails
    pub fn analysis_failed(detail: &str) -> Self {
        Self {
            is_sufficient: false,
            confidence_score: 0.0,
            reasoning: format!("Analysis failed: {}", detail),
            estimated_completeness: CompletenessEstimate::uniform(Completeness::Unknown),
        }
    }

    /// Verdict for a job with no transcript and no metadata to analyze
    pub fn no_data() -> Self {
        Self {
            is_sufficient: false,
            confidence_score: 0.0,
            reasoning: "No data provided for analysis".to_string(),
            estimated_completeness: CompletenessEstimate::uniform(Completeness::Missing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completeness_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Completeness::Partial).unwrap(),
            "\"partial\""
        );
        assert_eq!(
            serde_json::from_str::<Completeness>("\"missing\"").unwrap(),
            Completeness::Missing
        );
    }

    #[test]
    fn partial_json_parses_with_defaults() {
        let result: SufficiencyResult =
            serde_json::from_str(r#"{"is_sufficient": true, "confidence_score": 0.85}"#).unwrap();
        assert!(result.is_sufficient);
        assert_eq!(result.confidence_score, 0.85);
        assert_eq!(result.reasoning, "");
        assert_eq!(
            result.estimated_completeness.ingredients,
            Completeness::Unknown
        );
    }

    #[test]
    fn analysis_failed_is_conservative() {
        let result = SufficiencyResult::analysis_failed("timeout");
        assert!(!result.is_sufficient);
        assert_eq!(result.confidence_score, 0.0);
        assert!(result.reasoning.contains("timeout"));
        assert_eq!(
            result.estimated_completeness,
            CompletenessEstimate::uniform(Completeness::Unknown)
        );
    }

    #[test]
    fn no_data_marks_everything_missing() {
        let result = SufficiencyResult::no_data();
        assert!(!result.is_sufficient);
        assert_eq!(
            result.estimated_completeness,
            CompletenessEstimate::uniform(Completeness::Missing)
        );
    }
}
