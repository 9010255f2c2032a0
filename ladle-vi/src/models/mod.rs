//! Data models for ladle-vi (Video Ingest microservice)
//!
//! - Ingest job state machine and per-stage diagnostics
//! - Fixed error taxonomy
//! - Recipe draft schema and validation
//! - Sufficiency classification result

pub mod ingest_error;
pub mod job;
pub mod recipe;
pub mod sufficiency;

pub use ingest_error::{ErrorCode, IngestError};
pub use job::{IngestJob, JobStatus, StageTimings, StatusTransition};
pub use recipe::{
    Ingredient, RecipeDraft, RecipeRecord, RecipeStats, RecipeStatus, validate_draft,
};
pub use sufficiency::{Completeness, CompletenessEstimate, SufficiencyResult};
