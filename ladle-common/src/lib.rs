//! # Ladle Common Library
//!
//! Shared code for the ladle services including:
//! - Error types
//! - Configuration loading and root folder resolution
//! - Event types (IngestEvent enum) and the broadcast EventBus
//! - SSE streaming helpers

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
