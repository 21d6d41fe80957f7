//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/kubeassist/config.toml)
//! 3. Environment variables (KUBEASSIST_*)
//! 4. CLI arguments, including their own env fallbacks such as OPENAI_API_KEY (highest priority)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
