//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! A `Config` is built once per run and passed by reference into the
//! components that need it; nothing reads configuration from globals.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::ai::timeout::TimeoutConfig;
use crate::constants;
use crate::types::{AssistError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Language-model backend settings
    pub llm: LlmConfig,

    /// Schema grounding settings
    pub schema: SchemaConfig,

    /// Cluster connection settings
    pub cluster: ClusterConfig,

    /// Interactive session settings
    pub session: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            schema: SchemaConfig::default(),
            cluster: ClusterConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `AssistError::Config` on validation failure.
    ///
    /// Temperature is deliberately left alone: it is passed through to the
    /// backend, which owns its validation.
    pub fn validate(&self) -> Result<()> {
        if self.llm.timeout_secs == 0 {
            return Err(AssistError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.llm.model.trim().is_empty() {
            return Err(AssistError::Config(
                "LLM model/deployment name must not be empty".to_string(),
            ));
        }

        url::Url::parse(&self.llm.endpoint).map_err(|e| {
            AssistError::Config(format!("Invalid endpoint URL '{}': {}", self.llm.endpoint, e))
        })?;

        if let Some(schema_url) = &self.schema.url {
            url::Url::parse(schema_url).map_err(|e| {
                AssistError::Config(format!("Invalid schema URL '{}': {}", schema_url, e))
            })?;
        }

        if self.schema.timeout_secs == 0 || self.cluster.timeout_secs == 0 {
            return Err(AssistError::Config(
                "Schema and cluster timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.schema.max_kinds == 0 {
            return Err(AssistError::Config(
                "Schema max_kinds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Fail fast when the backend credential is absent
    pub fn require_credentials(&self) -> Result<()> {
        match self.llm.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(AssistError::ConfigurationMissing(
                "Please provide an OpenAI key (--openai-api-key or OPENAI_API_KEY)".to_string(),
            )),
        }
    }

    /// Deadlines for every suspension point
    pub fn timeouts(&self) -> TimeoutConfig {
        TimeoutConfig {
            completion: Duration::from_secs(self.llm.timeout_secs),
            schema: Duration::from_secs(self.schema.timeout_secs),
            apply: Duration::from_secs(self.cluster.timeout_secs),
        }
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

/// Which request shape the backend is spoken to with
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompletionApi {
    /// Decide from the model name
    #[default]
    Auto,
    /// Multi-turn chat completions
    Chat,
    /// Single-prompt completions
    Completion,
}

impl std::str::FromStr for CompletionApi {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(CompletionApi::Auto),
            "chat" => Ok(CompletionApi::Chat),
            "completion" => Ok(CompletionApi::Completion),
            _ => Err(format!(
                "Unknown completion API: {}. Valid values: auto, chat, completion",
                s
            )),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model or deployment name
    pub model: String,

    /// Backend base URL (OpenAI, Azure OpenAI, or a compatible server)
    pub endpoint: String,

    /// API key. Never serialized to output
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Logical model name -> deployment name
    pub model_map: BTreeMap<String, String>,

    /// Sampling temperature, passed through unmodified
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum tokens to generate
    pub max_tokens: usize,

    /// Request shape
    pub completion_api: CompletionApi,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model_map", &self.model_map)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .field("completion_api", &self.completion_api)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: constants::llm::DEFAULT_MODEL.to_string(),
            endpoint: constants::llm::OPENAI_API_BASE.to_string(),
            api_key: None,
            model_map: BTreeMap::new(),
            temperature: constants::llm::DEFAULT_TEMPERATURE,
            timeout_secs: constants::llm::DEFAULT_TIMEOUT_SECS,
            max_tokens: constants::llm::DEFAULT_MAX_TOKENS,
            completion_api: CompletionApi::Auto,
        }
    }
}

/// Parse a `model=deployment,model2=deployment2` remapping table
pub fn parse_model_map(s: &str) -> std::result::Result<BTreeMap<String, String>, String> {
    let mut map = BTreeMap::new();
    for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (model, deployment) = pair
            .split_once('=')
            .ok_or_else(|| format!("Invalid model mapping '{}': expected model=deployment", pair))?;
        let (model, deployment) = (model.trim(), deployment.trim());
        if model.is_empty() || deployment.is_empty() {
            return Err(format!(
                "Invalid model mapping '{}': model and deployment must be non-empty",
                pair
            ));
        }
        map.insert(model.to_string(), deployment.to_string());
    }
    Ok(map)
}

// =============================================================================
// Schema Configuration
// =============================================================================

/// How schema grounding failures are treated
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GroundingMode {
    /// Never consult the schema
    Off,
    /// Ground when possible, continue without on failure
    #[default]
    BestEffort,
    /// Fail the generation step when grounding fails
    Required,
}

impl std::fmt::Display for GroundingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroundingMode::Off => write!(f, "off"),
            GroundingMode::BestEffort => write!(f, "best-effort"),
            GroundingMode::Required => write!(f, "required"),
        }
    }
}

impl std::str::FromStr for GroundingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" => Ok(GroundingMode::Off),
            "best-effort" | "besteffort" => Ok(GroundingMode::BestEffort),
            "required" => Ok(GroundingMode::Required),
            _ => Err(format!(
                "Unknown grounding mode: {}. Valid values: off, best-effort, required",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Schema-server override URL; the cluster API is used when unset
    pub url: Option<String>,

    /// Failure policy
    pub grounding: GroundingMode,

    /// Maximum resource kinds grounded per request
    pub max_kinds: usize,

    /// Maximum characters per rendered fragment
    pub max_fragment_chars: usize,

    /// Fetch timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            url: None,
            grounding: GroundingMode::BestEffort,
            max_kinds: constants::schema::DEFAULT_MAX_KINDS,
            max_fragment_chars: constants::schema::DEFAULT_MAX_FRAGMENT_CHARS,
            timeout_secs: constants::schema::DEFAULT_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// Cluster Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Kubeconfig path; `$KUBECONFIG` / `~/.kube/config` when unset
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context; the current context when unset
    pub context: Option<String>,

    /// Namespace for manifests that name none
    pub namespace: Option<String>,

    /// Apply timeout in seconds
    pub timeout_secs: u64,

    /// Field manager recorded by server-side apply
    pub field_manager: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            namespace: None,
            timeout_secs: constants::cluster::DEFAULT_TIMEOUT_SECS,
            field_manager: constants::cluster::FIELD_MANAGER.to_string(),
        }
    }
}

// =============================================================================
// Session Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Print the first candidate and exit
    pub raw: bool,

    /// Ask before applying
    pub require_confirmation: bool,

    /// Debug logging
    pub debug: bool,

    /// Reprompts allowed before the choice is withdrawn
    pub max_reprompts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            raw: false,
            require_confirmation: true,
            debug: false,
            max_reprompts: constants::session::DEFAULT_MAX_REPROMPTS,
        }
    }
}

// =============================================================================
// Command-line Overrides
// =============================================================================

/// Highest-priority layer, merged over files and environment
///
/// Only `Some` values are serialized, so unset flags never mask lower layers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    pub llm: LlmOverrides,
    pub schema: SchemaOverrides,
    pub cluster: ClusterOverrides,
    pub session: SessionOverrides,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LlmOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_map: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_api: Option<CompletionApi>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grounding: Option<GroundingMode>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_confirmation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_reprompts: Option<u32>,
}

// =============================================================================
// Tests
// =============================================================================
