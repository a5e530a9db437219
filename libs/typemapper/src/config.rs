use serde::Deserialize;

use crate::error::MappingError;

/// What the row driver does with a value its converter rejects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Leave the field untouched and record the failure in the report.
    #[default]
    Skip,
    /// Stop mapping the row with [`MappingError::Conversion`].
    Abort,
}

/// Mapper configuration, parsed from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MapperConfig {
    #[serde(default)]
    pub on_conversion_failure: FailurePolicy,

    /// Register the stock scalar converters at startup.
    #[serde(default = "default_converters")]
    pub default_converters: bool,
}

fn default_converters() -> bool {
    true
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            on_conversion_failure: FailurePolicy::default(),
            default_converters: default_converters(),
        }
    }
}

impl MapperConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, MappingError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MappingError::Config(format!("{path}: {e}")))?;
        Self::parse(&content).map_err(|e| e.with_context(path))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, MappingError> {
        toml::from_str(toml_str).map_err(|e| MappingError::Config(e.to_string()))
    }
}
