use std::path::PathBuf;
use thiserror::Error;

/// Failure while resolving the model configuration.
///
/// All of these are fatal at pipeline construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read from disk.
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not a valid YAML mapping.
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required key is absent.
    #[error("missing configuration key `{0}`")]
    MissingKey(String),

    /// The key exists but its value is not a scalar usable as a string.
    #[error("configuration key `{key}` has an unusable value: {reason}")]
    InvalidValue { key: String, reason: String },
}
