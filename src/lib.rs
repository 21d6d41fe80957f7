//! kubeassist - natural-language assistant for kubectl
//!
//! Turns a plain request into Kubernetes manifests with an LLM, grounds the
//! prompt in the live cluster's OpenAPI schema, and applies the result only
//! after the operator confirms it.
//!
//! ## Modules
//!
//! - [`ai`]: completion backends, prompt construction, deadline guards
//! - [`schema`]: OpenAPI retrieval, resource lookup, prompt grounding
//! - [`cluster`]: kube-rs connection, manifest parsing, server-side apply
//! - [`session`]: the generation, confirmation and apply loop
//! - [`config`]: layered configuration
//! - [`cli`]: terminal operator, spinner and command wiring

pub mod ai;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod schema;
pub mod session;
pub mod types;

// Configuration
pub use config::{Config, ConfigLoader, ConfigOverrides, GroundingMode};

// Error Types
pub use types::error::{AssistError, RejectionReason, Result};

// Core types
pub use types::{CandidateManifest, ConversationTranscript, Role, Turn};

// Session
pub use session::{InteractionController, LoopOutcome, Operator, OperatorDecision};

// Terminal
pub use cli::{ConsoleOperator, ConsoleSpinner, Output};
