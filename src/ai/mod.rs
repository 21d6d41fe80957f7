//! AI Integration Layer
//!
//! Completion backends, the service that turns a transcript into the next
//! candidate manifest, prompt construction, and deadline guards.

pub mod completion;
pub mod prompt;
pub mod provider;
pub mod timeout;

pub use completion::CompletionService;
pub use prompt::{PromptBuilder, PromptSection, PromptTemplates};
pub use provider::{
    BackendFlavor, CompletionBackend, CompletionRequest, CompletionResponse, OpenAiBackend,
    SharedBackend, TokenUsage, create_backend,
};
pub use timeout::{TimeoutConfig, cancellable, guarded, with_timeout};
