//! Recipe draft schema, validation, and the persisted record model
//!
//! The structuring stage produces raw JSON; `validate_draft` is the
//! parse-then-validate step that turns it into a typed draft or a list
//! of validation errors. Field presence is never trusted implicitly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One ingredient line: name plus free-text quantity ("2 cups", "a pinch")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    #[serde(default)]
    pub quantity: String,
}

/// Structured recipe draft as produced by the structuring stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeDraft {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub ingredients: Vec<Ingredient>,

    #[serde(default)]
    pub instructions: Vec<String>,

    #[serde(default)]
    pub prep_time_minutes: Option<u32>,

    #[serde(default)]
    pub cook_time_minutes: Option<u32>,

    #[serde(default)]
    pub servings: Option<u32>,

    /// Difficulty on a 1-5 scale
    #[serde(default)]
    pub difficulty: Option<u8>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub nutrition: BTreeMap<String, String>,

    // Source metadata attached after a successful parse, not requested
    // from the model
    #[serde(default)]
    pub source_url: Option<String>,

    #[serde(default)]
    pub author_handle: Option<String>,

    #[serde(default)]
    pub is_public: Option<bool>,

    #[serde(default)]
    pub source_platform: Option<String>,

    #[serde(default)]
    pub original_job_id: Option<String>,

    #[serde(default)]
    pub video_thumbnail: Option<String>,
}

impl RecipeDraft {
    /// Attach fixed source metadata to a freshly parsed draft
    pub fn attach_source_metadata(
        &mut self,
        source_url: &str,
        author_handle: Option<&str>,
        job_id: Uuid,
        thumbnail_url: Option<&str>,
    ) {
        self.source_url = Some(source_url.to_string());
        self.author_handle = author_handle.map(|a| a.to_string());
        self.is_public = Some(true);
        self.source_platform = Some(platform_from_url(source_url));
        self.original_job_id = Some(job_id.to_string());
        self.video_thumbnail = thumbnail_url.map(|t| t.to_string());
    }
}

/// Derive a platform tag from the source URL host
pub fn platform_from_url(url: &str) -> String {
    let host = url
        .split("//")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    if host.contains("tiktok") {
        "tiktok".to_string()
    } else if host.is_empty() {
        "unknown".to_string()
    } else {
        host
    }
}

/// Parse-then-validate a raw structuring result.
///
/// Returns the typed draft, or every validation problem found. A draft is
/// usable only with a non-empty title, at least one ingredient, and at
/// least one instruction.
pub fn validate_draft(value: &serde_json::Value) -> Result<RecipeDraft, Vec<String>> {
    let draft: RecipeDraft = match serde_json::from_value(value.clone()) {
        Ok(draft) => draft,
        Err(e) => return Err(vec![format!("Recipe JSON has the wrong shape: {}", e)]),
    };

    let mut errors = Vec::new();

    if draft.title.trim().is_empty() {
        errors.push("Missing or empty required field: title".to_string());
    }
    if draft.ingredients.is_empty() {
        errors.push("Missing or empty required field: ingredients".to_string());
    } else if draft.ingredients.iter().all(|i| i.name.trim().is_empty()) {
        errors.push("All ingredient names are empty".to_string());
    }
    if draft.instructions.is_empty() {
        errors.push("Missing or empty required field: instructions".to_string());
    } else if draft.instructions.iter().all(|s| s.trim().is_empty()) {
        errors.push("All instruction steps are empty".to_string());
    }
    if let Some(difficulty) = draft.difficulty {
        if !(1..=5).contains(&difficulty) {
            errors.push(format!("Difficulty out of range 1-5: {}", difficulty));
        }
    }
    if let Some(servings) = draft.servings {
        if servings == 0 {
            errors.push("Servings must be at least 1".to_string());
        }
    }

    if errors.is_empty() {
        Ok(draft)
    } else {
        Err(errors)
    }
}

/// Summary block computed for the status projection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeStats {
    pub ingredients_count: usize,
    pub instructions_count: usize,
    pub has_prep_time: bool,
    pub has_cook_time: bool,
    pub has_servings: bool,
    pub has_difficulty: bool,
    pub has_nutrition: bool,
    pub has_tags: bool,
    pub has_description: bool,
}

impl RecipeStats {
    pub fn from_draft(draft: &RecipeDraft) -> Self {
        Self {
            ingredients_count: draft.ingredients.len(),
            instructions_count: draft.instructions.len(),
            has_prep_time: draft.prep_time_minutes.is_some(),
            has_cook_time: draft.cook_time_minutes.is_some(),
            has_servings: draft.servings.is_some(),
            has_difficulty: draft.difficulty.is_some(),
            has_nutrition: !draft.nutrition.is_empty(),
            has_tags: !draft.tags.is_empty(),
            has_description: draft
                .description
                .as_ref()
                .map(|d| !d.trim().is_empty())
                .unwrap_or(false),
        }
    }
}

/// Record status: forward-only DRAFT → ACTIVE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecipeStatus {
    Draft,
    Active,
}

impl RecipeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipeStatus::Draft => "DRAFT",
            RecipeStatus::Active => "ACTIVE",
        }
    }
}

/// Persisted recipe record (recipes table row)
///
/// `likes_count` and `saved_by` belong to the like service; the pipeline
/// writes them only at stub creation and never afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeRecord {
    pub recipe_id: String,
    pub owner_uid: String,
    pub job_id: Uuid,
    pub status: RecipeStatus,
    pub source_url: String,
    pub title: Option<String>,
    pub recipe_json: Option<serde_json::Value>,
    pub author_handle: Option<String>,
    pub thumbnail_url: Option<String>,
    pub likes_count: i64,
    pub saved_by: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecipeRecord {
    /// Create the empty owned stub paired with a new job
    pub fn stub(recipe_id: String, owner_uid: String, job_id: Uuid, source_url: String) -> Self {
        let now = Utc::now();
        Self {
            recipe_id,
            owner_uid,
            job_id,
            status: RecipeStatus::Draft,
            source_url,
            title: None,
            recipe_json: None,
            author_handle: None,
            thumbnail_url: None,
            likes_count: 0,
            saved_by: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
