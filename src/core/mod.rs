pub mod config;
pub mod error;
pub mod labels;

pub use config::{
    ConfigProvider, ConfigurationManager, ModelSettings, YamlConfig, BEST_MODEL_PATH,
    DEFAULT_CONFIG_FILE, PRE_TRAINED_MODEL_NAME,
};
pub use error::ConfigError;
pub use labels::Sentiment;
