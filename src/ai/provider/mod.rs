//! Completion Backend Abstraction
//!
//! Defines the `CompletionBackend` trait the interaction loop talks to.
//! Every backend receives the full transcript and returns zero or more
//! candidate texts; choosing among them is the caller's job.

mod openai;

pub use openai::{BackendFlavor, OpenAiBackend};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::types::{Result, Turn};

// =============================================================================
// Request / Response
// =============================================================================

/// One completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    /// Full conversation so far, oldest first
    pub turns: &'a [Turn],
    /// Sampling temperature, passed through unmodified
    pub temperature: f32,
    /// Logical model name; backends may remap it to a deployment
    pub model: &'a str,
}

/// Token counts as reported in the OpenAI `usage` object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Backend reply: candidate texts in the order the backend returned them
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    pub choices: Vec<String>,
    pub usage: TokenUsage,
}

impl CompletionResponse {
    pub fn new(choices: Vec<String>) -> Self {
        Self {
            choices,
            usage: TokenUsage::default(),
        }
    }
}

/// Shared backend type held by the completion service
pub type SharedBackend = Arc<dyn CompletionBackend>;

// =============================================================================
// Backend Trait
// =============================================================================

/// A chat- or completion-style language model endpoint
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send the transcript and return the raw choices
    ///
    /// Transport failures map to `BackendUnavailable`, non-success statuses
    /// to `BackendRejected`. No retry happens here.
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<CompletionResponse>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Create a shared backend from configuration
pub fn create_backend(config: &LlmConfig) -> Result<SharedBackend> {
    Ok(Arc::new(OpenAiBackend::new(config)?))
}
