//! Compiler configuration (kestrel.toml)

use std::collections::BTreeMap;
use std::path::Path;

use kestrel_types::TargetLayout;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Top-level compiler configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Target data layout
    #[serde(default)]
    pub target: TargetConfig,

    /// Build conditions consulted by patch records
    #[serde(default)]
    pub conditions: BTreeMap<String, bool>,
}

/// `[target]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TargetConfig {
    /// Native pointer size in bytes
    pub pointer_size: u32,
    /// Native pointer alignment in bytes
    pub pointer_align: u32,
    /// Object reference size in bytes
    pub reference_size: u32,
    /// Object reference alignment in bytes
    pub reference_align: u32,
    /// Type id size in bytes
    pub type_id_size: u32,
    /// Type id alignment in bytes
    pub type_id_align: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig::from(TargetLayout::default())
    }
}

impl From<TargetLayout> for TargetConfig {
    fn from(layout: TargetLayout) -> Self {
        TargetConfig {
            pointer_size: layout.pointer_size,
            pointer_align: layout.pointer_align,
            reference_size: layout.reference_size,
            reference_align: layout.reference_align,
            type_id_size: layout.type_id_size,
            type_id_align: layout.type_id_align,
        }
    }
}

impl TargetConfig {
    /// The layout described by this section
    pub fn layout(&self) -> TargetLayout {
        TargetLayout {
            pointer_size: self.pointer_size,
            pointer_align: self.pointer_align,
            reference_size: self.reference_size,
            reference_align: self.reference_align,
            type_id_size: self.type_id_size,
            type_id_align: self.type_id_align,
        }
    }
}

impl CompilerConfig {
    /// Parse the configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse the configuration from a string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CompilerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.target
            .layout()
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if let Some(name) = self.conditions.keys().find(|k| k.trim().is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid condition name: '{}'",
                name
            )));
        }

        Ok(())
    }

    /// Enable or disable a build condition
    pub fn with_condition(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.conditions.insert(name.into(), enabled);
        self
    }

    /// Whether a build condition is enabled; unknown conditions are not
    pub fn is_enabled(&self, condition: &str) -> bool {
        self.conditions.get(condition).copied().unwrap_or(false)
    }
}

/// Guard attached to a patch record
///
/// Holds when every `when` condition is enabled and no `unless` condition
/// is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    /// Conditions that must all be enabled
    #[serde(default)]
    pub when: Vec<String>,
    /// Conditions that must all be disabled
    #[serde(default)]
    pub unless: Vec<String>,
}

impl Condition {
    /// A condition that always holds
    pub fn always() -> Self {
        Condition::default()
    }

    /// Require `name` to be enabled
    pub fn when(mut self, name: impl Into<String>) -> Self {
        self.when.push(name.into());
        self
    }

    /// Require `name` to be disabled
    pub fn unless(mut self, name: impl Into<String>) -> Self {
        self.unless.push(name.into());
        self
    }

    /// Evaluate against the configured build conditions
    pub fn evaluate(&self, config: &CompilerConfig) -> bool {
        self.when.iter().all(|c| config.is_enabled(c))
            && !self.unless.iter().any(|c| config.is_enabled(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = CompilerConfig::from_toml_str("").unwrap();
        assert_eq!(config.target.layout(), TargetLayout::default());
        assert!(config.conditions.is_empty());
    }

    #[test]
    fn test_parse_target_and_conditions() {
        let toml = r#"
[target]
pointer-size = 4
pointer-align = 4

[conditions]
posix = true
threads = false
"#;
        let config = CompilerConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.target.pointer_size, 4);
        assert_eq!(config.target.reference_size, 4);
        assert_eq!(config.target.type_id_align, 4);
        assert!(config.is_enabled("posix"));
        assert!(!config.is_enabled("threads"));
        assert!(!config.is_enabled("unknown"));
    }

    #[test]
    fn test_rejects_bad_alignment() {
        let toml = r#"
[target]
reference-align = 3
"#;
        let err = CompilerConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = CompilerConfig::from_toml_str("[target\npointer-size = 8").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_condition_evaluation() {
        let config = CompilerConfig::default()
            .with_condition("posix", true)
            .with_condition("linux", true);

        assert!(Condition::always().evaluate(&config));
        assert!(Condition::always().when("posix").when("linux").evaluate(&config));
        assert!(!Condition::always().when("windows").evaluate(&config));
        assert!(!Condition::always().when("posix").unless("linux").evaluate(&config));
        assert!(Condition::always().unless("windows").evaluate(&config));
    }
}
