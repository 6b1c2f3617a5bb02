// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and resolve `${VAR}` / `${VAR:default}` placeholders
//! 2. Parse YAML/TOML/JSON selected by file extension
//! 3. Apply `FIELDNODE_`-prefixed environment overrides
//! 4. Validate the configuration
//!
//! # Environment Variable Override
//!
//! Scalar settings can be overridden without editing the file:
//!
//! ```text
//! FIELDNODE_NODE_ID=plant-7
//! FIELDNODE_MODBUS_PORT=1502
//! FIELDNODE_QUERY_ENABLED=false
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::schema::FieldnodeConfig;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML (`.yaml` / `.yml`).
    Yaml,
    /// TOML (`.toml`).
    Toml,
    /// JSON (`.json`).
    Json,
}

impl ConfigFormat {
    /// Derives the format from a file extension.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnsupportedFormat`] for unknown extensions.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        match extension.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            other => Err(ConfigError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Loads, parses, and validates controller configuration files.
///
/// # Examples
///
/// ```no_run
/// use fieldnode_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("fieldnode.yaml").unwrap();
/// println!("node: {}", config.node.id);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix for overrides.
    env_prefix: String,

    /// Whether to resolve placeholders and apply environment overrides.
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a loader with default settings.
    pub fn new() -> Self {
        Self {
            env_prefix: "FIELDNODE".to_string(),
            resolve_env_vars: true,
        }
    }

    /// Overrides the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable handling.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads configuration from a file, format selected by extension.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] raised by reading, parsing, environment
    /// handling, or validation.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<FieldnodeConfig> {
        let path = path.as_ref();
        info!("loading configuration from {}", path.display());

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;

        let format = ConfigFormat::from_path(path)?;
        let config = self
            .load_from_str(&content, format)
            .map_err(|e| match e {
                ConfigError::Serialization { message } => ConfigError::parse(path, message),
                other => other,
            })?;

        debug!(
            devices = config.devices.len(),
            registers = config.registers.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Loads configuration from a string in the given format.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Serialization`] on parse failure, or any validation
    /// error.
    pub fn load_from_str(
        &self,
        content: &str,
        format: ConfigFormat,
    ) -> ConfigResult<FieldnodeConfig> {
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        let mut config: FieldnodeConfig = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(&content)
                .map_err(|e| ConfigError::serialization(e.to_string()))?,
            ConfigFormat::Toml => {
                toml::from_str(&content).map_err(|e| ConfigError::serialization(e.to_string()))?
            }
            ConfigFormat::Json => serde_json::from_str(&content)
                .map_err(|e| ConfigError::serialization(e.to_string()))?,
        };

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Applies `PREFIX_`-prefixed overrides for scalar settings.
    fn apply_env_overrides(&self, config: &mut FieldnodeConfig) -> ConfigResult<()> {
        if let Some(id) = self.env_var("NODE_ID") {
            config.node.id = id;
        }
        if let Some(port) = self.parsed_env_var("MODBUS_PORT")? {
            config.modbus.port = port;
        }
        if let Some(slots) = self.parsed_env_var("MODBUS_SLOTS")? {
            config.modbus.slots = slots;
        }
        if let Some(enabled) = self.parsed_env_var("MODBUS_ENABLED")? {
            config.modbus.enabled = enabled;
        }
        if let Some(port) = self.parsed_env_var("QUERY_PORT")? {
            config.query.port = port;
        }
        if let Some(enabled) = self.parsed_env_var("QUERY_ENABLED")? {
            config.query.enabled = enabled;
        }
        Ok(())
    }

    fn env_var(&self, suffix: &str) -> Option<String> {
        env::var(format!("{}_{}", self.env_prefix, suffix)).ok()
    }

    fn parsed_env_var<T: std::str::FromStr>(&self, suffix: &str) -> ConfigResult<Option<T>>
    where
        T::Err: std::fmt::Display,
    {
        let name = format!("{}_{}", self.env_prefix, suffix);
        match env::var(&name) {
            Ok(raw) => raw
                .parse()
                .map(Some)
                .map_err(|e| ConfigError::invalid_env_var(&name, format!("{e}"))),
            Err(_) => Ok(None),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Placeholder resolution
// =============================================================================

/// Resolves `${VAR}` and `${VAR:default}` placeholders in raw content.
///
/// An unset variable without a default resolves to the empty string; an
/// unterminated placeholder is kept as-is.
fn resolve_env_placeholders(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' || chars.peek() != Some(&'{') {
            result.push(c);
            continue;
        }
        chars.next(); // consume '{'

        let mut var_content = String::new();
        let mut found_close = false;
        for c in chars.by_ref() {
            if c == '}' {
                found_close = true;
                break;
            }
            var_content.push(c);
        }
        if !found_close {
            result.push_str("${");
            result.push_str(&var_content);
            continue;
        }

        let (var_name, default_value) = match var_content.find(':') {
            Some(idx) => (&var_content[..idx], Some(&var_content[idx + 1..])),
            None => (var_content.as_str(), None),
        };
        match env::var(var_name) {
            Ok(value) => result.push_str(&value),
            Err(_) => {
                if let Some(default) = default_value {
                    result.push_str(default);
                }
            }
        }
    }

    result
}

// =============================================================================
// Convenience functions
// =============================================================================

/// Loads configuration from a file with default loader settings.
///
/// # Errors
///
/// Any [`ConfigError`] raised while loading or validating.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<FieldnodeConfig> {
    ConfigLoader::new().load(path)
}

/// Parses configuration from a string with default loader settings.
///
/// # Errors
///
/// Any [`ConfigError`] raised while parsing or validating.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<FieldnodeConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_YAML: &str = r#"
node:
  id: node-1
devices:
  - name: relay_1
    driver:
      type: relay
  - name: input_1
    driver:
      type: input
      debounce_ms: 20
  - name: sensor_1
    driver:
      type: probe
registers:
  - device: relay_1
    address: 0
  - device: sensor_1
    address: 0
    multiplier: 10.0
modbus:
  port: 1502
  slots: 4
"#;

    #[test]
    fn test_load_yaml_string() {
        let config = load_config_str(SAMPLE_YAML, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.node.id, "node-1");
        assert_eq!(config.devices.len(), 3);
        assert_eq!(config.modbus.port, 1502);
        assert_eq!(config.modbus.slots, 4);
        // Unset sections take defaults.
        assert!(config.query.enabled);
        assert_eq!(config.query.port, 8080);
        // Multiplier defaults to 1.0 when omitted.
        assert_eq!(config.registers[0].multiplier, 1.0);
        assert_eq!(config.registers[1].multiplier, 10.0);
    }

    #[test]
    fn test_load_toml_string() {
        let toml = r#"
[node]
id = "node-2"

[[devices]]
name = "relay_1"
driver = { type = "relay" }

[[registers]]
device = "relay_1"
address = 3
"#;
        let config = load_config_str(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(config.node.id, "node-2");
        assert_eq!(config.registers[0].address, 3);
    }

    #[test]
    fn test_load_json_string() {
        let json = r#"{"node": {"id": "node-3"}}"#;
        let config = load_config_str(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.node.id, "node-3");
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_load_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fieldnode.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE_YAML.as_bytes()).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.node.id, "node-1");
    }

    #[test]
    fn test_missing_file() {
        let err = load_config("/nonexistent/fieldnode.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fieldnode.ini");
        std::fs::write(&path, "nope").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "node: [not, a, mapping]").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "node:\n  id: n\n  surprise: 1\n";
        let err = load_config_str(yaml, ConfigFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Serialization { .. }));
    }

    #[test]
    fn test_invalid_config_rejected_after_parse() {
        let yaml = "node:\n  id: n\nmodbus:\n  slots: 0\n";
        let err = load_config_str(yaml, ConfigFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn test_env_placeholder_with_default() {
        let resolved = resolve_env_placeholders("id: ${FIELDNODE_TEST_UNSET_VAR:fallback}");
        assert_eq!(resolved, "id: fallback");

        let resolved = resolve_env_placeholders("id: ${FIELDNODE_TEST_UNSET_VAR}");
        assert_eq!(resolved, "id: ");

        // Unterminated placeholders pass through untouched.
        let resolved = resolve_env_placeholders("id: ${BROKEN");
        assert_eq!(resolved, "id: ${BROKEN");
    }

    #[test]
    fn test_env_override_applied() {
        // A unique prefix keeps this test independent of the real env.
        std::env::set_var("FNTEST_A_MODBUS_PORT", "1510");
        let loader = ConfigLoader::new().with_env_prefix("FNTEST_A");
        let config = loader
            .load_from_str("node:\n  id: n\n", ConfigFormat::Yaml)
            .unwrap();
        assert_eq!(config.modbus.port, 1510);
        std::env::remove_var("FNTEST_A_MODBUS_PORT");
    }

    #[test]
    fn test_env_override_bad_value() {
        std::env::set_var("FNTEST_B_MODBUS_SLOTS", "many");
        let loader = ConfigLoader::new().with_env_prefix("FNTEST_B");
        let err = loader
            .load_from_str("node:\n  id: n\n", ConfigFormat::Yaml)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { .. }));
        std::env::remove_var("FNTEST_B_MODBUS_SLOTS");
    }

    #[test]
    fn test_env_handling_can_be_disabled() {
        std::env::set_var("FNTEST_C_MODBUS_PORT", "9999");
        let loader = ConfigLoader::new()
            .with_env_prefix("FNTEST_C")
            .with_env_vars(false);
        let config = loader
            .load_from_str("node:\n  id: n\n", ConfigFormat::Yaml)
            .unwrap();
        assert_eq!(config.modbus.port, 502);
        std::env::remove_var("FNTEST_C_MODBUS_PORT");
    }
}
