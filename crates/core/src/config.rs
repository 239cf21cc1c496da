//! TOML-based configuration for the revision engine.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, see [`EngineConfig::default`]) yields a usable configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classify::ClassifierPolicy;
use crate::conflict::{MergeOptions, MergeStrategy};
use crate::errors::ConfigError;
use crate::tree::ROOT_PATH;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level engine configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path naming and logging.
    #[serde(default)]
    pub engine: EngineSection,

    /// Three-way merge behaviour.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Change classification policy.
    #[serde(default)]
    pub classifier: ClassifierPolicy,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSection {
    /// Base path for block paths in diffs and conflicts (default "root").
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_root_path() -> String {
    ROOT_PATH.into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Conflict policy: ours, theirs, or manual.
    #[serde(default)]
    pub strategy: MergeStrategy,

    /// Merge divergent leaf edits field by field before reporting a conflict.
    #[serde(default)]
    pub field_level: bool,
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl EngineConfig {
    /// Load an [`EngineConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Render this configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validate that all fields are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let root = self.engine.root_path.trim();
        if root.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "engine.root_path".into(),
                detail: "root path must not be empty".into(),
            });
        }
        if root.split('.').any(str::is_empty) {
            return Err(ConfigError::InvalidValue {
                field: "engine.root_path".into(),
                detail: "root path must not contain empty segments".into(),
            });
        }
        if !LOG_LEVELS.contains(&self.engine.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "engine.log_level".into(),
                detail: format!("must be one of {}", LOG_LEVELS.join(", ")),
            });
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Merge options derived from the `[engine]` and `[merge]` sections.
    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            strategy: self.merge.strategy,
            base_path: self.engine.root_path.clone(),
            field_level: self.merge.field_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::AttributeOnlySeverity;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[engine]
root_path = "page"
log_level = "debug"

[merge]
strategy = "theirs"
field_level = true

[classifier]
attribute_only = "patch"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config = EngineConfig::from_toml_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.engine.root_path, "page");
        assert_eq!(config.merge.strategy, MergeStrategy::Theirs);
        assert!(config.merge.field_level);
        assert_eq!(config.classifier.attribute_only, AttributeOnlySeverity::Patch);
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blockrev.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = EngineConfig::load_and_validate(&path).expect("load failed");
        assert_eq!(config.engine.log_level, "debug");

        let options = config.merge_options();
        assert_eq!(options.base_path, "page");
        assert_eq!(options.strategy, MergeStrategy::Theirs);
    }

    #[test]
    fn test_file_not_found() {
        let result = EngineConfig::load_from_file("/nonexistent/blockrev.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_unknown_strategy_is_parse_error() {
        let result = EngineConfig::from_toml_str("[merge]\nstrategy = \"mine\"\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.engine.root_path = "root..x".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "engine.root_path"
        ));

        let mut config = EngineConfig::default();
        config.engine.log_level = "loud".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "engine.log_level"
        ));
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.engine.root_path, "root");
        assert_eq!(config.engine.log_level, "info");
        assert_eq!(config.merge.strategy, MergeStrategy::Ours);
        assert!(!config.merge.field_level);
        assert_eq!(config.classifier.attribute_only, AttributeOnlySeverity::Minor);
    }

    #[test]
    fn test_default_renders_and_reloads() {
        let rendered = EngineConfig::default().to_toml_string().unwrap();
        assert!(rendered.contains("[merge]"));
        assert_eq!(
            EngineConfig::from_toml_str(&rendered).unwrap(),
            EngineConfig::default()
        );
    }
}
