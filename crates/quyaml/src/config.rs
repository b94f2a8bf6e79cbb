//! Parser configuration.
//!
//! Supports loading configuration from:
//! 1. Configuration files (YAML)
//! 2. Environment variables (with `QUYAML_` prefix)
//!
//! Environment variables override file values, which override defaults.
//! Configuration is always passed explicitly into [`crate::load`],
//! [`crate::compile`] and [`crate::parse_with_config`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expr::MathFn;

/// Resource ceilings enforced by the safety loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum input size in bytes.
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: usize,

    /// Maximum structural nesting depth.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum declared qubit or bit register size.
    #[serde(default = "default_max_register_size")]
    pub max_register_size: usize,
}

/// Complete parser configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Loader resource ceilings.
    #[serde(default)]
    pub limits: Limits,

    /// Accept legacy `0.2` / `0.3` documents.
    #[serde(default = "default_true")]
    pub allow_legacy_versions: bool,

    /// Functions callable from parameter expressions.
    #[serde(default = "default_functions")]
    pub functions: Vec<MathFn>,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Validation(String),
}

fn default_max_input_bytes() -> usize {
    1_000_000
}

fn default_max_depth() -> usize {
    50
}

fn default_max_register_size() -> usize {
    4096
}

fn default_true() -> bool {
    true
}

fn default_functions() -> Vec<MathFn> {
    MathFn::ALL.to_vec()
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_bytes: default_max_input_bytes(),
            max_depth: default_max_depth(),
            max_register_size: default_max_register_size(),
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            allow_legacy_versions: default_true(),
            functions: default_functions(),
        }
    }
}

impl ParserConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: ParserConfig = serde_yaml_ng::from_str(&contents)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with the following precedence:
    /// 1. Load from file if provided, else defaults
    /// 2. Apply environment variable overrides
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        let config = config.merge_env();
        config.validate()?;
        Ok(config)
    }

    /// Merge `QUYAML_*` environment variables into this configuration.
    #[must_use]
    pub fn merge_env(self) -> Self {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    /// Merge overrides from an arbitrary variable source.
    ///
    /// Only variables that are present and parse cleanly override fields.
    #[must_use]
    pub fn merge_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = lookup("QUYAML_MAX_INPUT_BYTES").and_then(|v| v.parse().ok()) {
            self.limits.max_input_bytes = val;
        }
        if let Some(val) = lookup("QUYAML_MAX_DEPTH").and_then(|v| v.parse().ok()) {
            self.limits.max_depth = val;
        }
        if let Some(val) = lookup("QUYAML_MAX_REGISTER_SIZE").and_then(|v| v.parse().ok()) {
            self.limits.max_register_size = val;
        }
        if let Some(val) = lookup("QUYAML_ALLOW_LEGACY").and_then(|v| parse_flag(&v)) {
            self.allow_legacy_versions = val;
        }
        self
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_input_bytes == 0 {
            return Err(ConfigError::Validation(
                "max_input_bytes must be greater than 0".to_string(),
            ));
        }
        if self.limits.max_depth == 0 {
            return Err(ConfigError::Validation(
                "max_depth must be greater than 0".to_string(),
            ));
        }
        if self.limits.max_register_size == 0 {
            return Err(ConfigError::Validation(
                "max_register_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ParserConfig::default();
        assert_eq!(config.limits.max_input_bytes, 1_000_000);
        assert_eq!(config.limits.max_depth, 50);
        assert_eq!(config.limits.max_register_size, 4096);
        assert!(config.allow_legacy_versions);
        assert_eq!(config.functions.len(), MathFn::ALL.len());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: ParserConfig =
            serde_yaml_ng::from_str("limits:\n  max_depth: 8\nfunctions: [sin, sqrt]\n").unwrap();
        assert_eq!(config.limits.max_depth, 8);
        assert_eq!(config.limits.max_input_bytes, 1_000_000);
        assert_eq!(config.limits.max_register_size, 4096);
        assert_eq!(config.functions, vec![MathFn::Sin, MathFn::Sqrt]);
        assert!(config.allow_legacy_versions);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = ParserConfig::default();
        config.limits.max_depth = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));

        let mut config = ParserConfig::default();
        config.limits.max_register_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(msg)) if msg.contains("max_register_size")
        ));
    }

    #[test]
    fn test_merge_vars_overrides_only_present_values() {
        let vars: HashMap<&str, &str> = [
            ("QUYAML_MAX_DEPTH", "12"),
            ("QUYAML_MAX_REGISTER_SIZE", "64"),
            ("QUYAML_ALLOW_LEGACY", "off"),
            ("QUYAML_MAX_INPUT_BYTES", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = ParserConfig::default().merge_vars(|k| vars.get(k).map(|v| (*v).to_string()));
        assert_eq!(config.limits.max_depth, 12);
        assert_eq!(config.limits.max_register_size, 64);
        assert!(!config.allow_legacy_versions);
        assert_eq!(config.limits.max_input_bytes, 1_000_000);
    }

    #[test]
    fn test_from_file_missing() {
        let result = ParserConfig::from_file("/nonexistent/quyaml.yaml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
