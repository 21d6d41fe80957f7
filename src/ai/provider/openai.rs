//! OpenAI API Backend
//!
//! Speaks the OpenAI REST shapes to three kinds of endpoint:
//! - api.openai.com (Bearer auth)
//! - Azure OpenAI (`api-key` header, deployment-scoped routes, `api-version` query)
//! - any OpenAI-compatible server (Bearer auth, plain routes)
//!
//! Both the chat-completions and the legacy completions shape are supported;
//! the latter receives the transcript flattened into one prompt.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{CompletionBackend, CompletionRequest, CompletionResponse, TokenUsage};
use crate::config::{CompletionApi, LlmConfig};
use crate::constants::llm::{AZURE_API_VERSION, AZURE_HOST_MARKER};
use crate::types::{AssistError, ConversationTranscript, Result, Turn};

/// Which dialect of the OpenAI API the endpoint speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendFlavor {
    OpenAi,
    Azure,
    Compatible,
}

impl BackendFlavor {
    /// Infer the dialect from the endpoint host
    pub fn detect(endpoint: &str) -> Self {
        let host = url::Url::parse(endpoint)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
            .unwrap_or_default();

        if host.contains(AZURE_HOST_MARKER) {
            BackendFlavor::Azure
        } else if host == "api.openai.com" {
            BackendFlavor::OpenAi
        } else {
            BackendFlavor::Compatible
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            BackendFlavor::OpenAi => "openai",
            BackendFlavor::Azure => "azure-openai",
            BackendFlavor::Compatible => "openai-compatible",
        }
    }
}

/// Models that only serve the legacy completions route
fn is_completion_model(name: &str) -> bool {
    let name = name.to_lowercase();
    name.ends_with("-instruct")
        || name.starts_with("text-")
        || name.starts_with("davinci")
        || name.starts_with("babbage")
}

/// OpenAI-family backend with secure API key handling
pub struct OpenAiBackend {
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    endpoint: String,
    flavor: BackendFlavor,
    model_map: BTreeMap<String, String>,
    api: CompletionApi,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("flavor", &self.flavor)
            .field("model_map", &self.model_map)
            .field("api", &self.api)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiBackend {
    /// Build a backend, inferring the flavor from the endpoint
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Self::with_flavor(config, BackendFlavor::detect(&config.endpoint))
    }

    pub fn with_flavor(config: &LlmConfig, flavor: BackendFlavor) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                AssistError::ConfigurationMissing(
                    "OpenAI API key not found. Set OPENAI_API_KEY or pass --openai-api-key"
                        .to_string(),
                )
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                AssistError::BackendUnavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            flavor,
            model_map: config.model_map.clone(),
            api: config.completion_api,
            max_tokens: config.max_tokens,
            client,
        })
    }

    pub fn flavor(&self) -> BackendFlavor {
        self.flavor
    }

    /// Deployment name after applying the remapping table
    fn deployment<'a>(&'a self, model: &'a str) -> &'a str {
        self.model_map.get(model).map(String::as_str).unwrap_or(model)
    }

    fn uses_chat(&self, deployment: &str) -> bool {
        match self.api {
            CompletionApi::Chat => true,
            CompletionApi::Completion => false,
            CompletionApi::Auto => !is_completion_model(deployment),
        }
    }

    fn url(&self, deployment: &str, chat: bool) -> String {
        let route = if chat { "chat/completions" } else { "completions" };
        match self.flavor {
            BackendFlavor::Azure => format!(
                "{}/openai/deployments/{}/{}?api-version={}",
                self.endpoint, deployment, route, AZURE_API_VERSION
            ),
            BackendFlavor::OpenAi | BackendFlavor::Compatible => {
                format!("{}/{}", self.endpoint, route)
            }
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.flavor {
            BackendFlavor::Azure => builder.header("api-key", self.api_key.expose_secret()),
            BackendFlavor::OpenAi | BackendFlavor::Compatible => builder.header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            ),
        }
    }

    fn build_body(&self, request: &CompletionRequest<'_>, deployment: &str, chat: bool) -> RequestBody {
        // Azure routes by deployment path and ignores the model field
        let model = match self.flavor {
            BackendFlavor::Azure => None,
            _ => Some(deployment.to_string()),
        };

        if chat {
            RequestBody::Chat(ChatCompletionRequest {
                model,
                messages: request.turns.iter().map(ChatMessage::from).collect(),
                temperature: request.temperature,
                max_tokens: Some(self.max_tokens),
            })
        } else {
            let mut transcript = ConversationTranscript::new();
            for turn in request.turns {
                transcript.push(turn.clone());
            }
            RequestBody::Completion(TextCompletionRequest {
                model,
                prompt: transcript.to_prompt(),
                temperature: request.temperature,
                max_tokens: Some(self.max_tokens),
            })
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<CompletionResponse> {
        let deployment = self.deployment(request.model);
        let chat = self.uses_chat(deployment);

        info!(
            "Requesting completion ({}, deployment: {}, temperature: {}, turns: {})",
            self.flavor.as_str(),
            deployment,
            request.temperature,
            request.turns.len()
        );

        let start_time = Instant::now();
        let url = self.url(deployment, chat);
        let body = self.build_body(request, deployment, chat);

        debug!("POST {}", url);

        let response = self
            .authorize(self.client.post(&url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AssistError::BackendUnavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AssistError::rejected(status, error_message(&body)));
        }

        let response_body: CompletionResponseBody = response.json().await.map_err(|e| {
            AssistError::BackendUnavailable(format!("Failed to parse completion response: {}", e))
        })?;

        let usage = response_body.usage.unwrap_or_default();

        let choices: Vec<String> = response_body
            .choices
            .into_iter()
            .map(|choice| {
                choice
                    .message
                    .and_then(|m| m.content)
                    .or(choice.text)
                    .unwrap_or_default()
            })
            .collect();

        debug!(
            "Received {} choice(s) in {:?} ({} tokens)",
            choices.len(),
            start_time.elapsed(),
            usage.total()
        );

        Ok(CompletionResponse { choices, usage })
    }

    fn name(&self) -> &str {
        self.flavor.as_str()
    }
}

/// Pull `error.message` out of an OpenAI error body, falling back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|e| e.error.message)
        .unwrap_or_else(|| body.trim().to_string())
}

// Request/Response types

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestBody {
    Chat(ChatCompletionRequest),
    Completion(TextCompletionRequest),
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
struct TextCompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    prompt: String,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.as_str(),
            content: turn.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponseBody {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}
