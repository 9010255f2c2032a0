//! Recipe quality analysis
//!
//! Scores a structured draft against minimum standards (ingredient and
//! step counts, measurement coverage, timing, title) and decides whether
//! a confident-but-poor result should trigger the fallback OCR pass.
//!
//! Weighting: measurements 40% (scaled by coverage ratio), detailed
//! steps 30%, timing 20%, non-trivial title 10%.

use crate::models::RecipeDraft;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

static MEASUREMENT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b\d+(?:\.\d+)?(?:\s*(?:cup|tbsp|tsp|oz|lb|g|kg|ml|l|pound|tablespoon|teaspoon|inch|large|medium|small|cloves?|bunch|bulbs?))\b",
    )
    .unwrap()
});

static TIMING_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+\s*(?:minute|min|hour|hr|second|sec)s?\b").unwrap());

/// Result of scoring one structured draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityResult {
    pub is_complete: bool,
    pub quality_score: f64,
    pub missing_components: Vec<String>,
    pub quality_issues: Vec<String>,
    pub ingredient_count: usize,
    pub step_count: usize,
    pub has_measurements: bool,
    pub has_timing: bool,
    pub meets_minimum_standards: bool,
}

/// Whether the fallback OCR pass should run, and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackDecision {
    pub should_fallback: bool,
    pub reasons: Vec<String>,
    pub confidence_quality_mismatch: bool,
    pub fallback_trigger_score: f64,
    pub original_confidence: f64,
}

/// Scores drafts and makes fallback decisions.
pub struct QualityAnalyzer {
    min_ingredients: usize,
    min_steps: usize,
    min_quality_score: f64,
}

impl QualityAnalyzer {
    pub fn new() -> Self {
        Self {
            min_ingredients: 3,
            min_steps: 2,
            min_quality_score: 0.6,
        }
    }

    /// Score a draft. `None` (structuring produced nothing usable)
    /// scores zero with every component reported missing.
    pub fn analyze(&self, draft: Option<&RecipeDraft>) -> QualityResult {
        let draft = match draft {
            Some(d) => d,
            None => return self.empty_result("Recipe JSON is None or empty"),
        };

        let (has_measurements, measurement_ratio) = analyze_ingredients(&draft.ingredients);
        let has_detailed_steps = average_step_length(&draft.instructions) > 20.0;
        let has_timing = analyze_timing(draft);

        let mut score = 0.0;
        if has_measurements {
            score += 0.4 * measurement_ratio;
        }
        if has_detailed_steps {
            score += 0.3;
        }
        if has_timing {
            score += 0.2;
        }
        if draft.title.trim().chars().count() > 5 {
            score += 0.1;
        }
        let quality_score = score.min(1.0);

        let ingredient_count = draft.ingredients.len();
        let step_count = draft.instructions.len();

        let mut missing_components = Vec::new();
        let mut quality_issues = Vec::new();

        if ingredient_count < self.min_ingredients {
            missing_components.push(format!(
                "ingredients (has {}, need {})",
                ingredient_count, self.min_ingredients
            ));
        }
        if step_count < self.min_steps {
            missing_components.push(format!(
                "cooking steps (has {}, need {})",
                step_count, self.min_steps
            ));
        }
        if !has_measurements {
            missing_components.push("ingredient measurements".to_string());
            quality_issues.push("Most ingredients lack specific measurements".to_string());
        }
        if !has_timing {
            quality_issues.push("No cooking times or temperatures specified".to_string());
        }
        if draft.title.trim().is_empty() {
            quality_issues.push("Missing or empty recipe title".to_string());
        }
        let vague_steps = draft
            .instructions
            .iter()
            .filter(|step| step.trim().chars().count() < 10)
            .count();
        if vague_steps > 0 {
            quality_issues.push(format!(
                "{} cooking steps are too vague or short",
                vague_steps
            ));
        }

        let is_complete = ingredient_count >= self.min_ingredients
            && step_count >= self.min_steps
            && has_measurements
            && quality_score >= self.min_quality_score;
        let meets_minimum_standards =
            ingredient_count >= self.min_ingredients && step_count >= self.min_steps;

        let result = QualityResult {
            is_complete,
            quality_score,
            missing_components,
            quality_issues,
            ingredient_count,
            step_count,
            has_measurements,
            has_timing,
            meets_minimum_standards,
        };

        info!(
            complete = result.is_complete,
            score = format!("{:.2}", result.quality_score),
            "Recipe quality analysis"
        );
        result
    }

    /// Decide whether a confident classifier verdict paired with a weak
    /// draft warrants the fallback OCR pass. Any of the three
    /// mismatch rules is enough; all that apply are reported.
    pub fn should_trigger_fallback(
        &self,
        quality: &QualityResult,
        original_confidence: f64,
    ) -> FallbackDecision {
        let mut should_fallback = false;
        let mut reasons = Vec::new();

        if !quality.meets_minimum_standards && original_confidence > 0.7 {
            should_fallback = true;
            reasons.push(format!(
                "Recipe incomplete despite high AI confidence ({:.2})",
                original_confidence
            ));
        }

        if quality.quality_score < 0.3 && original_confidence > 0.8 {
            should_fallback = true;
            reasons.push(format!(
                "Very low quality score ({:.2}) despite high confidence",
                quality.quality_score
            ));
        }

        if quality.missing_components.len() >= 2 && original_confidence > 0.75 {
            should_fallback = true;
            reasons.push(format!(
                "Missing {} critical components",
                quality.missing_components.len()
            ));
        }

        FallbackDecision {
            should_fallback,
            reasons,
            confidence_quality_mismatch: original_confidence > 0.7 && quality.quality_score < 0.5,
            fallback_trigger_score: quality.quality_score,
            original_confidence,
        }
    }

    fn empty_result(&self, reason: &str) -> QualityResult {
        QualityResult {
            is_complete: false,
            quality_score: 0.0,
            missing_components: vec!["all components".to_string()],
            quality_issues: vec![reason.to_string()],
            ingredient_count: 0,
            step_count: 0,
            has_measurements: false,
            has_timing: false,
            meets_minimum_standards: false,
        }
    }
}

impl Default for QualityAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns (has_measurements, measurement_ratio). An ingredient counts
/// as measured when it has a name and either a non-empty quantity or a
/// quantity matching the number-plus-unit pattern; coverage of at
/// least 70% counts as measured overall.
fn analyze_ingredients(ingredients: &[crate::models::Ingredient]) -> (bool, f64) {
    if ingredients.is_empty() {
        return (false, 0.0);
    }

    let measured = ingredients
        .iter()
        .filter(|ing| {
            let has_name = !ing.name.trim().is_empty();
            let has_quantity = !ing.quantity.trim().is_empty();
            let has_measurement = MEASUREMENT_PATTERN.is_match(&ing.quantity.to_lowercase());
            has_name && (has_quantity || has_measurement)
        })
        .count();

    let measurement_ratio = measured as f64 / ingredients.len() as f64;
    (measurement_ratio >= 0.7, measurement_ratio)
}

fn average_step_length(steps: &[String]) -> f64 {
    if steps.is_empty() {
        return 0.0;
    }
    let total: usize = steps.iter().map(|s| s.trim().chars().count()).sum();
    total as f64 / steps.len() as f64
}

fn analyze_timing(draft: &RecipeDraft) -> bool {
    if draft.prep_time_minutes.is_some() || draft.cook_time_minutes.is_some() {
        return true;
    }
    draft
        .instructions
        .iter()
        .any(|step| TIMING_PATTERN.is_match(&step.to_lowercase()))
}
