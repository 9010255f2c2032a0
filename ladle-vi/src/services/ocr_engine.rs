//! On-screen text recognition
//!
//! Runs tesseract over sampled frames and turns its TSV output into
//! per-frame text lines. Recognized lines are filtered to confidence
//! above 0.5 and at least two characters before they reach the pipeline.
//!
//! The pure helpers below the trait (near-duplicate merge, ingredient
//! candidate scan) run on every recognizer's output, including test
//! doubles, so the pipeline behaves the same regardless of engine.

use crate::services::frame_sampler::SampledFrame;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Quantity-plus-unit pattern marking a text line as a likely ingredient.
static INGREDIENT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(\d+\s?(?:[/.]\d+)?\s?(?:cup|tbsp|tsp|g|kg|ml|l|oz|lb|teaspoon|tablespoon|gram|pound|ounce|pinch|clove|slice|can|package|stick|dash|handful|bunch|piece|quart|pint|liter|milliliter|milligram|mg|cm|mm|inch|drop)s?\b)",
    )
    .unwrap()
});

/// OCR errors
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("tesseract not available at '{0}'")]
    EngineUnavailable(String),

    #[error("tesseract failed: {0}")]
    EngineFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One recognized text line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrLine {
    pub text: String,
    /// Recognition confidence in 0.0..=1.0.
    pub confidence: f64,
    /// (left, top, width, height) in frame pixels, when the engine reports one.
    #[serde(default)]
    pub bbox: Option<(i32, i32, i32, i32)>,
}

/// All text recognized in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameOcr {
    pub timestamp_seconds: f64,
    pub lines: Vec<OcrLine>,
}

/// Recognizes text in sampled frames.
///
/// Implementations return only frames with at least one line surviving
/// the confidence (>0.5) and length (>1 character) filters.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, frames: &[SampledFrame]) -> Result<Vec<FrameOcr>, OcrError>;
}

/// Drop lines that are near-duplicates of text already seen in an
/// earlier frame or earlier in the same frame. The first occurrence
/// wins; comparison is on lowercased trimmed text with normalized
/// Levenshtein similarity above `threshold` treated as a duplicate.
/// Frames left with no lines are removed.
pub fn merge_near_duplicates(frames: Vec<FrameOcr>, threshold: f64) -> Vec<FrameOcr> {
    let mut seen: Vec<String> = Vec::new();
    frames
        .into_iter()
        .filter_map(|frame| {
            let lines: Vec<OcrLine> = frame
                .lines
                .into_iter()
                .filter(|line| {
                    let key = line.text.trim().to_lowercase();
                    if seen
                        .iter()
                        .any(|s| strsim::normalized_levenshtein(&key, s) > threshold)
                    {
                        return false;
                    }
                    seen.push(key);
                    true
                })
                .collect();
            if lines.is_empty() {
                None
            } else {
                Some(FrameOcr {
                    timestamp_seconds: frame.timestamp_seconds,
                    lines,
                })
            }
        })
        .collect()
}

/// Collect lines that look like ingredients (a number followed by a
/// measurement unit), in frame order.
pub fn ingredient_candidates(frames: &[FrameOcr]) -> Vec<String> {
    frames
        .iter()
        .flat_map(|frame| frame.lines.iter())
        .filter(|line| INGREDIENT_PATTERN.is_match(&line.text))
        .map(|line| line.text.clone())
        .collect()
}

/// tesseract CLI backed recognizer
pub struct TesseractOcr {
    tesseract_path: String,
    availability: tokio::sync::OnceCell<bool>,
}

impl TesseractOcr {
    pub fn new(tesseract_path: impl Into<String>) -> Self {
        Self {
            tesseract_path: tesseract_path.into(),
            availability: tokio::sync::OnceCell::new(),
        }
    }

    /// Check whether the tesseract binary exists, caching the answer.
    /// Called once at startup so a missing engine is logged before the
    /// first job rather than discovered mid-run.
    pub async fn check_available(&self) -> bool {
        *self
            .availability
            .get_or_init(|| async {
                let result = Command::new("which")
                    .arg(&self.tesseract_path)
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .await;
                let available = result.map(|status| status.success()).unwrap_or(false);
                debug!(
                    command = %self.tesseract_path,
                    available = available,
                    "Tesseract availability check"
                );
                available
            })
            .await
    }

    async fn recognize_frame(&self, frame: &SampledFrame) -> Result<Vec<OcrLine>, OcrError> {
        let output = Command::new(&self.tesseract_path)
            .arg(&frame.path)
            .arg("stdout")
            .arg("tsv")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| OcrError::EngineFailed(format!("failed to execute tesseract: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::EngineFailed(stderr.trim().to_string()));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        Ok(parse_tsv(&tsv))
    }
}

#[async_trait]
impl TextRecognizer for TesseractOcr {
    async fn recognize(&self, frames: &[SampledFrame]) -> Result<Vec<FrameOcr>, OcrError> {
        if !self.check_available().await {
            return Err(OcrError::EngineUnavailable(self.tesseract_path.clone()));
        }

        let mut results = Vec::new();
        for frame in frames {
            // A single unreadable frame should not sink the whole pass
            let mut lines = match self.recognize_frame(frame).await {
                Ok(lines) => lines,
                Err(e) => {
                    warn!(
                        frame = %frame.path.display(),
                        error = %e,
                        "Skipping frame after OCR failure"
                    );
                    continue;
                }
            };
            lines.retain(|line| line.confidence > 0.5 && line.text.trim().chars().count() > 1);
            if !lines.is_empty() {
                results.push(FrameOcr {
                    timestamp_seconds: frame.timestamp_seconds,
                    lines,
                });
            }
        }

        debug!(
            frames_in = frames.len(),
            frames_with_text = results.len(),
            "OCR pass complete"
        );

        Ok(results)
    }
}

struct WordRow {
    block: u32,
    par: u32,
    line: u32,
    left: i32,
    top: i32,
    width: i32,
    height: i32,
    conf: f64,
    text: String,
}

/// Parse tesseract TSV output into text lines.
///
/// Word rows (level 5) are grouped by (block, paragraph, line); each
/// group becomes one line with space-joined text, the mean word
/// confidence scaled to 0..1, and the union bounding box.
pub fn parse_tsv(tsv: &str) -> Vec<OcrLine> {
    let mut lines = Vec::new();
    let mut current_key: Option<(u32, u32, u32)> = None;
    let mut words: Vec<WordRow> = Vec::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let level: u32 = cols[0].parse().unwrap_or(0);
        if level != 5 {
            continue;
        }
        let conf: f64 = cols[10].parse().unwrap_or(-1.0);
        let text = cols[11].trim();
        if conf < 0.0 || text.is_empty() {
            continue;
        }

        let word = WordRow {
            block: cols[2].parse().unwrap_or(0),
            par: cols[3].parse().unwrap_or(0),
            line: cols[4].parse().unwrap_or(0),
            left: cols[6].parse().unwrap_or(0),
            top: cols[7].parse().unwrap_or(0),
            width: cols[8].parse().unwrap_or(0),
            height: cols[9].parse().unwrap_or(0),
            conf,
            text: text.to_string(),
        };

        let key = (word.block, word.par, word.line);
        if current_key != Some(key) {
            flush_line(&mut lines, &mut words);
            current_key = Some(key);
        }
        words.push(word);
    }
    flush_line(&mut lines, &mut words);
    lines
}

fn flush_line(lines: &mut Vec<OcrLine>, words: &mut Vec<WordRow>) {
    if words.is_empty() {
        return;
    }

    let text = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let confidence = words.iter().map(|w| w.conf).sum::<f64>() / words.len() as f64 / 100.0;

    let left = words.iter().map(|w| w.left).min().unwrap_or(0);
    let top = words.iter().map(|w| w.top).min().unwrap_or(0);
    let right = words.iter().map(|w| w.left + w.width).max().unwrap_or(0);
    let bottom = words.iter().map(|w| w.top + w.height).max().unwrap_or(0);

    lines.push(OcrLine {
        text,
        confidence,
        bbox: Some((left, top, right - left, bottom - top)),
    });
    words.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str, confidence: f64) -> OcrLine {
        OcrLine {
            text: text.to_string(),
            confidence,
            bbox: None,
        }
    }

    fn frame(timestamp: f64, texts: &[(&str, f64)]) -> FrameOcr {
        FrameOcr {
            timestamp_seconds: timestamp,
            lines: texts.iter().map(|(t, c)| line(t, *c)).collect(),
        }
    }

    #[test]
    fn parses_tsv_word_rows_into_lines() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t\n\
5\t1\t1\t1\t1\t1\t10\t20\t30\t12\t91.5\t1\n\
5\t1\t1\t1\t1\t2\t45\t20\t50\t12\t88.5\tcup\n\
5\t1\t1\t1\t1\t3\t100\t20\t60\t12\t90.0\tflour\n\
5\t1\t1\t1\t2\t1\t10\t40\t80\t12\t85.0\tMix\n\
5\t1\t1\t1\t2\t2\t95\t40\t60\t12\t87.0\twell\n";
        let lines = parse_tsv(tsv);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "1 cup flour");
        assert!((lines[0].confidence - 0.9).abs() < 1e-9);
        assert_eq!(lines[0].bbox, Some((10, 20, 150, 12)));
        assert_eq!(lines[1].text, "Mix well");
    }

    #[test]
    fn tsv_skips_unrecognized_and_empty_rows() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
4\t1\t1\t1\t1\t0\t10\t20\t200\t12\t-1\t\n\
5\t1\t1\t1\t1\t1\t10\t20\t30\t12\t-1\tghost\n\
short\trow\n";
        assert!(parse_tsv(tsv).is_empty());
    }

    #[test]
    fn merge_keeps_first_of_near_duplicates() {
        let frames = vec![
            frame(0.0, &[("1 cup flour", 0.99), ("2 tbsp sugar", 0.98)]),
            frame(1.0, &[("1 cup  flour", 0.97), ("Mix well", 0.9)]),
        ];
        let merged = merge_near_duplicates(frames, 0.9);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].lines.len(), 2);
        assert_eq!(merged[0].lines[0].text, "1 cup flour");
        assert_eq!(merged[1].lines.len(), 1);
        assert_eq!(merged[1].lines[0].text, "Mix well");
    }

    #[test]
    fn merge_drops_frames_left_empty() {
        let frames = vec![
            frame(0.0, &[("preheat the oven", 0.9)]),
            frame(2.0, &[("preheat the oven", 0.8)]),
        ];
        let merged = merge_near_duplicates(frames, 0.85);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].timestamp_seconds, 0.0);
    }

    #[test]
    fn merge_keeps_distinct_text() {
        let frames = vec![frame(0.0, &[("1 cup flour", 0.9), ("3 eggs", 0.9)])];
        let merged = merge_near_duplicates(frames, 0.85);
        assert_eq!(merged[0].lines.len(), 2);
    }

    #[test]
    fn ingredient_candidates_match_quantity_units() {
        let frames = vec![frame(
            0.0,
            &[
                ("1 cup flour", 0.9),
                ("2 tbsp sugar", 0.9),
                ("1/2 cup milk", 0.9),
                ("Mix well", 0.9),
                ("serve hot", 0.9),
            ],
        )];
        let candidates = ingredient_candidates(&frames);
        assert_eq!(
            candidates,
            vec!["1 cup flour", "2 tbsp sugar", "1/2 cup milk"]
        );
    }

    #[test]
    fn ingredient_candidates_are_case_insensitive() {
        let frames = vec![frame(0.0, &[("3 CLOVES GARLIC", 0.9)])];
        assert_eq!(ingredient_candidates(&frames), vec!["3 CLOVES GARLIC"]);
    }
}
