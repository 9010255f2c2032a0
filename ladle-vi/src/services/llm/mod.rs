//! LLM provider abstraction for sufficiency analysis and recipe structuring.
//!
//! This module provides a trait-based abstraction over language model
//! providers with a fake implementation for testing.

mod claude;
mod fake;

pub use claude::ClaudeProvider;
pub use fake::FakeProvider;

use async_trait::async_trait;
use ladle_common::config::LlmConfig;
use std::fmt;
use thiserror::Error;

/// Error type for LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API returned error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Trait for LLM providers.
///
/// Implementations should be stateless and thread-safe. The provider is
/// responsible for making API calls and returning the model's text response.
#[async_trait]
pub trait LlmProvider: Send + Sync + fmt::Debug {
    /// Send a prompt to the LLM and get a text response.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Get the provider name (e.g., "claude", "fake").
    fn provider_name(&self) -> &'static str;

    /// Get the model name (e.g., "claude-3-5-sonnet-20241022").
    fn model_name(&self) -> &str;
}

/// Build the production provider from config and a resolved API key.
pub fn create_provider(config: &LlmConfig, api_key: String) -> Box<dyn LlmProvider> {
    Box::new(ClaudeProvider::new(
        api_key,
        config.model.clone(),
        config.max_tokens,
    ))
}
