//! Configuration lookup for the sentiment model.
//!
//! The model is described by a small YAML file (conventionally
//! `model_config.yaml`) that names the pretrained encoder and points at the
//! trained checkpoint:
//!
//! ```yaml
//! PRE_TRAINED_MODEL_NAME: bert-base-cased
//! best_model_path: checkpoints/best_model_state.bin
//! ```
//!
//! Lookups go through the [`ConfigProvider`] trait so callers can supply
//! their own source (environment, in-memory map, ...).

use super::error::ConfigError;
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Key naming the pretrained encoder / tokenizer.
pub const PRE_TRAINED_MODEL_NAME: &str = "PRE_TRAINED_MODEL_NAME";
/// Key holding the filesystem path of the trained checkpoint.
pub const BEST_MODEL_PATH: &str = "best_model_path";

/// Default file name looked up by [`ConfigurationManager::load`].
pub const DEFAULT_CONFIG_FILE: &str = "model_config.yaml";

/// Read-only key/value configuration source.
pub trait ConfigProvider {
    fn get(&self, key: &str) -> Result<String, ConfigError>;

    /// Directory that relative paths in this configuration are resolved against.
    fn base_dir(&self) -> Option<&Path> {
        None
    }
}

impl ConfigProvider for HashMap<String, String> {
    fn get(&self, key: &str) -> Result<String, ConfigError> {
        HashMap::get(self, key)
            .cloned()
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }
}

/// A configuration loaded from a YAML mapping.
#[derive(Debug, Clone)]
pub struct YamlConfig {
    values: HashMap<String, Value>,
    base_dir: Option<PathBuf>,
}

impl YamlConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let values: HashMap<String, Value> =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!(path = %path.display(), keys = values.len(), "loaded model config");

        Ok(Self {
            values,
            base_dir: path.parent().map(Path::to_path_buf),
        })
    }

    /// Parse a YAML document held in memory. Relative paths stay relative to
    /// the working directory.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let values = serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<memory>"),
            source,
        })?;
        Ok(Self {
            values,
            base_dir: None,
        })
    }
}

impl ConfigProvider for YamlConfig {
    fn get(&self, key: &str) -> Result<String, ConfigError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Err(ConfigError::MissingKey(key.to_string())),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            Some(_) => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                reason: "expected a scalar".to_string(),
            }),
        }
    }

    fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }
}

/// Locates per-model configuration files under a common root, laid out as
/// `<root>/<model_dir>/<file>`.
#[derive(Debug, Clone)]
pub struct ConfigurationManager {
    model_dir: PathBuf,
}

impl ConfigurationManager {
    pub fn new(root: impl AsRef<Path>, model_dir: &str) -> Self {
        Self {
            model_dir: root.as_ref().join(model_dir),
        }
    }

    pub fn load_yaml(&self, file_name: &str) -> Result<YamlConfig, ConfigError> {
        YamlConfig::from_file(self.model_dir.join(file_name))
    }

    pub fn load(&self) -> Result<YamlConfig, ConfigError> {
        self.load_yaml(DEFAULT_CONFIG_FILE)
    }
}

/// The two settings the predictor needs, resolved once at setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub pretrained_model_name: String,
    pub best_model_path: PathBuf,
}

impl ModelSettings {
    pub fn resolve(provider: &dyn ConfigProvider) -> Result<Self, ConfigError> {
        let pretrained_model_name = provider.get(PRE_TRAINED_MODEL_NAME)?;
        if pretrained_model_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: PRE_TRAINED_MODEL_NAME.to_string(),
                reason: "empty model name".to_string(),
            });
        }

        let raw_path = PathBuf::from(provider.get(BEST_MODEL_PATH)?);
        let best_model_path = match provider.base_dir() {
            Some(base) if raw_path.is_relative() => base.join(raw_path),
            _ => raw_path,
        };

        Ok(Self {
            pretrained_model_name,
            best_model_path,
        })
    }
}
