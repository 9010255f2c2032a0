//! Title resolution
//!
//! Pure preference chain for the recipe title: source metadata first,
//! then the first sentence-like fragment of the transcript, then
//! recognized on-screen text. Normalization strips hashtag tokens and
//! trims, but deliberately keeps emoji, casing, and full length since
//! creators often put the whole recipe name in the title.

use crate::services::ocr_engine::FrameOcr;
use once_cell::sync::Lazy;
use regex::Regex;

static HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\w+").unwrap());

/// Words that mark an on-screen text block as recipe-title material.
const RECIPE_KEYWORDS: [&str; 26] = [
    "caramelized",
    "onion",
    "garlic",
    "spaghetti",
    "pasta",
    "sauce",
    "chicken",
    "beef",
    "pork",
    "salmon",
    "shrimp",
    "vegetables",
    "salad",
    "soup",
    "stew",
    "curry",
    "stir fry",
    "grilled",
    "baked",
    "fried",
    "roasted",
    "braised",
    "poached",
    "seared",
    "smoked",
    "pickled",
];

pub struct TitleResolver;

impl TitleResolver {
    /// Raw title from source metadata, if present and non-empty.
    pub fn from_metadata(metadata_title: Option<&str>) -> Option<String> {
        metadata_title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    /// First sentence-like fragment of the transcript with more than
    /// three characters after trimming.
    pub fn from_transcript(transcript: &str) -> Option<String> {
        transcript
            .split(['.', '!', '?', '\n'])
            .map(str::trim)
            .find(|s| s.chars().count() > 3)
            .map(str::to_string)
    }

    /// Best title-like fragment from recognized on-screen text.
    ///
    /// Scans blocks for a recipe keyword and concatenates nearby blocks
    /// (window of two before through two after) that carry a different
    /// keyword. With no multi-block match, falls back to the longest
    /// block when it has more than five characters.
    pub fn from_ocr_text(frames: &[FrameOcr]) -> Option<String> {
        let all_text: Vec<String> = frames
            .iter()
            .flat_map(|f| f.lines.iter())
            .map(|l| l.text.trim().to_string())
            .collect();
        if all_text.is_empty() {
            return None;
        }

        for (i, text) in all_text.iter().enumerate() {
            let text_lower = text.to_lowercase();
            for keyword in RECIPE_KEYWORDS {
                if !text_lower.contains(keyword) {
                    continue;
                }
                let mut title_parts = vec![text.clone()];
                let start = i.saturating_sub(2);
                let end = all_text.len().min(i + 3);
                for (j, nearby) in all_text.iter().enumerate().take(end).skip(start) {
                    if j == i {
                        continue;
                    }
                    let nearby_lower = nearby.to_lowercase();
                    if RECIPE_KEYWORDS
                        .iter()
                        .any(|other| *other != keyword && nearby_lower.contains(other))
                    {
                        title_parts.push(nearby.clone());
                    }
                }
                if title_parts.len() > 1 {
                    return Some(title_parts.join(" "));
                }
            }
        }

        let mut longest: &str = "";
        for text in &all_text {
            if text.chars().count() > longest.chars().count() {
                longest = text;
            }
        }
        if longest.chars().count() > 5 {
            return Some(longest.to_string());
        }
        None
    }

    /// Strip `#word` tokens and trim. Everything else, including emoji
    /// and casing, passes through untouched. Idempotent.
    pub fn normalize(raw_title: &str) -> String {
        let no_hashtags = HASHTAG.replace_all(raw_title, "");
        no_hashtags.trim().to_string()
    }

    /// Run the full preference chain and normalize the winner.
    /// Returns an empty string when no source yields a title.
    pub fn resolve(
        metadata_title: Option<&str>,
        transcript: &str,
        ocr_frames: &[FrameOcr],
    ) -> String {
        Self::from_metadata(metadata_title)
            .or_else(|| Self::from_transcript(transcript))
            .or_else(|| Self::from_ocr_text(ocr_frames))
            .map(|raw| Self::normalize(&raw))
            .unwrap_or_default()
    }
}
