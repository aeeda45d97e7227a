//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Resolve `ServerSettings` (input, split mode, blocks, channel bindings)
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let settings = ConfigLoader::load_from_path(Path::new("sampler.toml")).unwrap();
//! println!("Mode: {}", settings.mode.as_str());
//! ```

mod parser;
mod validator;

pub use contracts::{SamplerConfig, ServerSettings};
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and resolve configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<ServerSettings, ContractError> {
        let config = Self::read_config(path)?;
        Self::resolve(&config)
    }

    /// Load and resolve configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ServerSettings, ContractError> {
        let config = parser::parse(content, format)?;
        Self::resolve(&config)
    }

    /// Parse a configuration file without validating it
    ///
    /// Used when command line overrides are applied before resolution.
    pub fn read_config(path: &Path) -> Result<SamplerConfig, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        parser::parse(&content, format)
    }

    /// Validate a raw configuration and resolve it into settings
    pub fn resolve(config: &SamplerConfig) -> Result<ServerSettings, ContractError> {
        validator::validate(config)
    }

    /// Serialize SamplerConfig to TOML string
    pub fn to_toml(config: &SamplerConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize SamplerConfig to JSON string
    pub fn to_json(config: &SamplerConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}
