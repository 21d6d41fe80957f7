//! Layered configuration, lowest precedence first:
//! 1. Built-in defaults
//! 2. Global config (~/.config/kubeassist/config.toml)
//! 3. Environment variables (KUBEASSIST_* prefix, `__` between sections)
//! 4. Command-line overrides

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::{Config, ConfigOverrides};
use crate::types::{AssistError, Result};

const ENV_PREFIX: &str = "KUBEASSIST_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with the full resolution chain:
    /// defaults → global → env vars → command line
    pub fn load(overrides: &ConfigOverrides) -> Result<Config> {
        let global = Self::global_config_path().filter(|path| path.exists());
        Self::resolve(global.as_deref(), true, overrides)
    }

    /// Load configuration from a specific file, ignoring the environment
    pub fn load_from_file(path: &Path, overrides: &ConfigOverrides) -> Result<Config> {
        Self::resolve(Some(path), false, overrides)
    }

    fn resolve(file: Option<&Path>, with_env: bool, overrides: &ConfigOverrides) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(path) = file {
            debug!("Loading config from: {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        // e.g. KUBEASSIST_SCHEMA__MAX_KINDS -> schema.max_kinds
        if with_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true));
        }

        figment = figment.merge(Serialized::globals(overrides));

        let config: Config = figment
            .extract()
            .map_err(|e| AssistError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Get path to global config directory (~/.config/kubeassist/)
    pub fn global_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "kubeassist").map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Print where the global file lives and whether it exists
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }
        println!("  Env:     {}<SECTION>__<KEY>", ENV_PREFIX);
    }

    /// Show current effective configuration (the API key is never printed)
    pub fn show_config(as_json: bool, overrides: &ConfigOverrides) -> Result<()> {
        let config = Self::load(overrides)?;

        if as_json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| AssistError::Config(e.to_string()))?
            );
        }

        Ok(())
    }

    /// Write the commented default file; an existing file is kept unless `force`
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            AssistError::Config("Cannot determine global config directory".to_string())
        })?;
        Self::init_in(&global_dir, force)
    }

    fn init_in(dir: &Path, force: bool) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;

        let config_path = dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_global_config())?;
            info!("Created global config: {}", config_path.display());
        } else {
            info!("Global config exists: {}", config_path.display());
        }

        Ok(config_path)
    }

    /// Default global config content (TOML)
    fn default_global_config() -> String {
        r#"# kubectl-assist Global Configuration
# Environment variables (KUBEASSIST_*) and command-line flags override these.

version = "1.0"

[llm]
model = "gpt-3.5-turbo-0301"
endpoint = "https://api.openai.com/v1"
temperature = 0.0
timeout_secs = 120
completion_api = "auto"
# api_key is best supplied through OPENAI_API_KEY

# Logical model name -> Azure deployment name
[llm.model_map]

[schema]
grounding = "best-effort"
max_kinds = 3
timeout_secs = 30
# url = "http://localhost:8001/openapi/v2"

[cluster]
timeout_secs = 30
field_manager = "kubectl-assist"

[session]
require_confirmation = true
max_reprompts = 10
"#
        .to_string()
    }
}
