//! Configuration handling for nullprop

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{NullpropError, NullpropResult};

/// Name of the project configuration file looked up next to the input.
pub const CONFIG_FILE_NAME: &str = "nullprop.toml";

/// Nullprop configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NullpropConfig {
    /// Propagation settings
    #[serde(default)]
    pub propagation: PropagationConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Propagation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PropagationConfig {
    /// Pass names left out of the battery
    #[serde(default)]
    pub disabled_passes: Vec<String>,

    /// Type names treated as value types in addition to the built-ins
    #[serde(default)]
    pub value_types: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// How rewritten files are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// C#-style source text.
    #[default]
    Source,
    /// The program model as JSON.
    Json,
}

impl OutputFormat {
    /// File extension for rewritten files.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Source => "cs",
            OutputFormat::Json => "json",
        }
    }
}

impl NullpropConfig {
    /// Parse configuration text
    pub fn from_toml_str(content: &str) -> NullpropResult<Self> {
        toml::from_str(content)
            .map_err(|e| NullpropError::Config(format!("failed to parse config file: {}", e)))
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> NullpropResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| NullpropError::Config(format!("failed to read config file: {}", e)))?;
        Self::from_toml_str(&content)
    }

    /// Load `nullprop.toml` from `dir`, or the defaults if there is none
    pub fn load_from_project(dir: &Path) -> NullpropResult<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(NullpropConfig::default())
        }
    }
}
