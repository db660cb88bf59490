//! LLM summarization behind a narrow trait so handlers stay testable without
//! a live model, and so retry/timeout policy has a single seam if it is ever
//! added.

mod gemini;
mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use gemini::{GeminiConfig, GeminiSummarizer};
pub use mock::MockSummarizer;

#[derive(Error, Debug)]
pub enum SummarizerError {
    #[error("summarizer not configured: {0}")]
    NotConfigured(String),
    #[error("model API error: {0}")]
    Api(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("model returned no content")]
    Empty,
}

#[derive(Debug, Clone, Default)]
pub struct SummaryOptions {
    /// Soft cap on summary length, in words.
    pub max_words: Option<u32>,
    /// Optional emphasis, e.g. "action items".
    pub focus: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeneratedSummary {
    pub text: String,
    pub model: String,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize the supplied meeting/conversation content. Blocks until the
    /// model responds; no retries, no streaming.
    async fn generate(
        &self,
        content: &str,
        options: &SummaryOptions,
    ) -> Result<GeneratedSummary, SummarizerError>;
}

/// Pick the provider from the environment: Gemini when GEMINI_API_KEY is set,
/// otherwise the deterministic mock (which tests rely on).
pub fn from_env() -> Arc<dyn Summarizer> {
    match std::env::var("GEMINI_API_KEY") {
        Ok(api_key) if !api_key.is_empty() => {
            let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".to_string());
            Arc::new(GeminiSummarizer::new(GeminiConfig { api_key, model }))
        }
        _ => Arc::new(MockSummarizer::new()),
    }
}
