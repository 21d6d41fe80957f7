//! Config Command
//!
//! Usage:
//!   kubectl-assist config show [-f json]
//!   kubectl-assist config path
//!   kubectl-assist config init [--force]

use crate::cli::ui::Output;
use crate::config::{ConfigLoader, ConfigOverrides};
use crate::types::Result;

/// Show the merged effective configuration
pub fn show(format: &str, overrides: &ConfigOverrides) -> Result<()> {
    ConfigLoader::show_config(format == "json", overrides)
}

/// Show configuration paths
pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

/// Write the default global configuration file
pub fn init(force: bool) -> Result<()> {
    let config_path = ConfigLoader::init_global(force)?;
    Output::new().success(&format!("Wrote {}", config_path.display()));
    Ok(())
}
