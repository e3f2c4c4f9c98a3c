//! # Config Loader
//!
//! Reads a [`MissionBlueprint`] from TOML or JSON and rejects it unless every
//! section passes validation. Missing sections fall back to their defaults,
//! so an empty file describes a flat-terrain run with no sinks.
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("geotrack.toml")).unwrap();
//! println!("Link: {}", blueprint.link.address);
//! ```

mod parser;
mod validator;

pub use contracts::MissionBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Stateless entry point for blueprint loading
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a blueprint, picking the format from the `.toml` / `.json` extension
    ///
    /// # Errors
    /// `ConfigParse` for an unknown extension, unreadable file or malformed
    /// content; `ConfigValidation` naming the first offending field.
    pub fn load_from_path(path: &Path) -> Result<MissionBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Same as [`ConfigLoader::load_from_path`] for in-memory content
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<MissionBlueprint, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Re-check a blueprint after it was modified in code (CLI overrides)
    pub fn validate(blueprint: &MissionBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// Serialize MissionBlueprint to TOML string
    pub fn to_toml(blueprint: &MissionBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize MissionBlueprint to JSON string
    pub fn to_json(blueprint: &MissionBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    fn read_file(path: &Path) -> Result<String, ContractError> {
        std::fs::read_to_string(path).map_err(|e| ContractError::ConfigParse {
            message: format!("cannot read {}", path.display()),
            source: Some(Box::new(e)),
        })
    }

    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<MissionBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}
