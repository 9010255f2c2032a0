//! Conditional OCR gate
//!
//! Decides from the sufficiency verdict whether the frame sampling and
//! OCR stages can be skipped. The decision is recorded on the job so a
//! skipped extraction is auditable later.

use crate::models::SufficiencyResult;
use serde::{Deserialize, Serialize};

/// The gate's decision plus the inputs that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateDecision {
    pub skip_ocr: bool,
    pub confidence_score: f64,
    pub threshold: f64,
    pub reasoning: String,
}

/// Skip OCR only when the classifier is both positive and confident.
///
/// Confidence exactly at the threshold counts as confident enough.
pub fn should_skip_ocr(sufficiency: &SufficiencyResult, threshold: f64) -> GateDecision {
    let skip_ocr = sufficiency.is_sufficient && sufficiency.confidence_score >= threshold;
    GateDecision {
        skip_ocr,
        confidence_score: sufficiency.confidence_score,
        threshold,
        reasoning: sufficiency.reasoning.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(is_sufficient: bool, confidence_score: f64) -> SufficiencyResult {
        SufficiencyResult {
            is_sufficient,
            confidence_score,
            ..Default::default()
        }
    }

    #[test]
    fn skips_when_sufficient_and_confident() {
        assert!(should_skip_ocr(&verdict(true, 0.9), 0.7).skip_ocr);
    }

    #[test]
    fn confidence_exactly_at_threshold_skips() {
        assert!(should_skip_ocr(&verdict(true, 0.70), 0.7).skip_ocr);
    }

    #[test]
    fn confidence_just_below_threshold_runs_ocr() {
        assert!(!should_skip_ocr(&verdict(true, 0.69), 0.7).skip_ocr);
    }

    #[test]
    fn confidence_just_above_threshold_skips() {
        assert!(should_skip_ocr(&verdict(true, 0.71), 0.7).skip_ocr);
    }

    #[test]
    fn insufficient_verdict_runs_ocr_regardless_of_confidence() {
        assert!(!should_skip_ocr(&verdict(false, 0.95), 0.7).skip_ocr);
    }

    #[test]
    fn decision_records_inputs() {
        let mut v = verdict(true, 0.8);
        v.reasoning = "plenty of detail in the transcript".to_string();
        let decision = should_skip_ocr(&v, 0.7);
        assert_eq!(decision.confidence_score, 0.8);
        assert_eq!(decision.threshold, 0.7);
        assert_eq!(decision.reasoning, "plenty of detail in the transcript");
    }
}
