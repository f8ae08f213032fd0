pub mod core;
pub mod loaders;
pub mod models;
pub mod pipelines;

// Re-export core types
pub use crate::core::{ConfigError, ConfigProvider, ModelSettings, Sentiment};

pub use loaders::{HubModelProvider, LocalModelProvider, ModelProvider};

pub use pipelines::sentiment_analysis_pipeline::{
    SentimentAnalysisPipeline, SentimentAnalysisPipelineBuilder, SentimentResult,
};
