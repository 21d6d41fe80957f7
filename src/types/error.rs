//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//!
//! ## Error Groups
//!
//! - **Configuration**: missing credentials or invalid values (fatal before the loop)
//! - **Schema grounding**: unavailable document, unexpected shape, unknown kind
//! - **Completion**: backend unreachable, backend rejection, empty response
//! - **Apply**: unparsable manifest, cluster rejection, unreachable cluster
//!
//! Nothing here is retried automatically. Retrying is the operator's Reprompt.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Rejection Reasons
// =============================================================================

/// Why a backend refused a completion request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// Bad or missing credential (401/403)
    Auth,
    /// Rate limited or quota exhausted (429)
    RateLimit,
    /// Malformed request (400/422)
    BadRequest,
    /// Unknown model, deployment or route (404)
    NotFound,
    /// Backend-side failure (5xx)
    Server,
    /// Anything else
    Other,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auth => write!(f, "AUTH"),
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Server => write!(f, "SERVER"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

impl RejectionReason {
    /// Classify an HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth,
            429 => Self::RateLimit,
            400 | 422 => Self::BadRequest,
            404 => Self::NotFound,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum AssistError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------
    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),

    #[error("Config error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Schema Grounding
    // -------------------------------------------------------------------------
    #[error("Schema unavailable: {0}")]
    SchemaUnavailable(String),

    #[error("Unexpected schema shape at '{path}': {message}")]
    SchemaShape { path: String, message: String },

    #[error("Resource kind not found in schema: {0}")]
    ResourceNotFound(String),

    // -------------------------------------------------------------------------
    // Completion
    // -------------------------------------------------------------------------
    #[error("Completion backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Completion backend rejected the request [{reason}] ({status}): {message}")]
    BackendRejected {
        reason: RejectionReason,
        status: u16,
        message: String,
    },

    #[error("Completion backend returned no choices")]
    ResponseEmpty,

    #[error("Cancelled: {0}")]
    Cancelled(String),

    // -------------------------------------------------------------------------
    // Apply
    // -------------------------------------------------------------------------
    #[error("Manifest parse error: {0}")]
    ManifestParse(String),

    #[error("Cluster rejected the manifest: {0}")]
    ApplyRejected(String),

    #[error("Cluster connection error: {0}")]
    Connection(String),

    // -------------------------------------------------------------------------
    // Session
    // -------------------------------------------------------------------------
    #[error("Reprompt limit of {limit} reached")]
    RepromptLimitReached { limit: u32 },
}

pub type Result<T> = std::result::Result<T, AssistError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl AssistError {
    /// Create a schema shape error
    pub fn schema_shape(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaShape {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a backend rejection from an HTTP status and response body
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::BackendRejected {
            reason: RejectionReason::from_status(status),
            status,
            message: message.into(),
        }
    }

    /// Timeout of the completion request
    pub fn backend_timeout(duration: Duration) -> Self {
        Self::BackendUnavailable(format!("request timed out after {:?}", duration))
    }

    /// Timeout of a cluster call
    pub fn connection_timeout(duration: Duration) -> Self {
        Self::Connection(format!("cluster request timed out after {:?}", duration))
    }

    /// Timeout of a schema fetch
    pub fn schema_timeout(duration: Duration) -> Self {
        Self::SchemaUnavailable(format!("schema fetch timed out after {:?}", duration))
    }

    /// Check if this error belongs to schema grounding
    pub fn is_grounding(&self) -> bool {
        matches!(
            self,
            Self::SchemaUnavailable(_) | Self::SchemaShape { .. } | Self::ResourceNotFound(_)
        )
    }

    /// Check if this error was caused by operator interrupt
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Process exit status for a run that ended with this error
    pub fn exit_code(&self) -> u8 {
        if self.is_cancelled() { 130 } else { 1 }
    }
}

// =============================================================================
// Tests
// =============================================================================
