//! CLI configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via PLACENET_CONFIG or --config)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Logging configuration.
    pub log: LogConfig,
    /// Diagram output configuration.
    pub diagram: DiagramConfig,
}

impl Config {
    /// Loads configuration from `path` (or PLACENET_CONFIG), then applies
    /// environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("PLACENET_CONFIG").ok().map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.storage.apply_env_overrides();
        self.log.apply_env_overrides();
        self.diagram.apply_env_overrides();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.log.validate()
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl StorageConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("PLACENET_DATA") {
            self.data_dir = PathBuf::from(dir);
        }
    }

    /// Returns the workflow state directory.
    pub fn states_dir(&self) -> PathBuf {
        self.data_dir.join("states")
    }

    /// Returns the transition history directory.
    pub fn history_dir(&self) -> PathBuf {
        self.data_dir.join("history")
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level when RUST_LOG is not set.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl LogConfig {
    const LEVELS: [&'static str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

    fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("PLACENET_LOG") {
            if !level.is_empty() {
                self.level = level.to_lowercase();
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if Self::LEVELS.contains(&self.level.as_str()) {
            Ok(())
        } else {
            Err(ConfigError::ValidationError(format!(
                "unknown log level '{}' (expected one of {})",
                self.level,
                Self::LEVELS.join(", ")
            )))
        }
    }
}

/// Diagram output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramConfig {
    /// Whether printed diagrams emphasize the current places.
    pub highlight_current: bool,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            highlight_current: true,
        }
    }
}

impl DiagramConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(highlight) = std::env::var("PLACENET_DIAGRAM_HIGHLIGHT") {
            self.highlight_current = highlight == "1" || highlight.to_lowercase() == "true";
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.data_dir, PathBuf::from("./data"));
        assert_eq!(config.log.level, "warn");
        assert!(config.diagram.highlight_current);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_storage_paths() {
        let config = StorageConfig::default();
        assert_eq!(config.states_dir(), PathBuf::from("./data/states"));
        assert_eq!(config.history_dir(), PathBuf::from("./data/history"));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("placenet.yaml");

        let mut config = Config::default();
        config.storage.data_dir = PathBuf::from("/var/lib/placenet");
        config.diagram.highlight_current = false;
        config.save(&path).unwrap();

        let parsed = Config::from_file(&path).unwrap();
        assert_eq!(parsed.storage.data_dir, PathBuf::from("/var/lib/placenet"));
        assert!(!parsed.diagram.highlight_current);
        assert_eq!(parsed.log.level, "warn");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("placenet.yaml");
        std::fs::write(&path, "log:\n  level: debug\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.storage.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn test_config_errors() {
        let dir = TempDir::new().unwrap();

        let missing = Config::from_file(dir.path().join("missing.yaml"));
        assert!(matches!(missing, Err(ConfigError::IoError(..))));

        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "storage: [not, a, map]\n").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::ParseError(..))
        ));

        let mut config = Config::default();
        config.log.level = "loud".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
