//! Global Constants
//!
//! Centralized defaults for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Language-model backend constants
pub mod llm {
    /// Hosted OpenAI API base URL
    pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

    /// Default model / deployment name
    pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-0301";

    /// Azure OpenAI REST API version
    pub const AZURE_API_VERSION: &str = "2023-07-01-preview";

    /// Host suffix identifying Azure OpenAI endpoints
    pub const AZURE_HOST_MARKER: &str = "openai.azure.com";

    /// Default completion timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Default sampling temperature
    pub const DEFAULT_TEMPERATURE: f32 = 0.0;

    /// Upper bound on generated tokens per completion
    pub const DEFAULT_MAX_TOKENS: usize = 2048;
}

/// Schema grounding constants
pub mod schema {
    /// Key of the definitions section in an OpenAPI v2 document
    pub const DEFINITIONS_KEY: &str = "definitions";

    /// Cluster path serving the OpenAPI v2 document
    pub const OPENAPI_V2_PATH: &str = "/openapi/v2";

    /// Default schema fetch timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Maximum resource kinds grounded per request
    pub const DEFAULT_MAX_KINDS: usize = 3;

    /// Maximum characters of a rendered schema fragment
    pub const DEFAULT_MAX_FRAGMENT_CHARS: usize = 4000;

    /// Shortest word considered as a resource-kind hint
    pub const MIN_HINT_LEN: usize = 3;
    /// Longest run of adjacent words joined into one kind hint
    pub const MAX_HINT_WORDS: usize = 3;
}

/// Cluster constants
pub mod cluster {
    /// Namespace used when neither manifest nor context names one
    pub const FALLBACK_NAMESPACE: &str = "default";

    /// Field manager recorded for server-side apply
    pub const FIELD_MANAGER: &str = "kubectl-assist";

    /// Default apply timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
}

/// Interactive session constants
pub mod session {
    /// Maximum reprompts before the Reprompt choice is withdrawn
    pub const DEFAULT_MAX_REPROMPTS: u32 = 10;

    /// Spinner frames
    pub const SPINNER_FRAMES: [&str; 8] = ["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

    /// Spinner redraw interval (milliseconds)
    pub const SPINNER_INTERVAL_MS: u64 = 100;
}
