//! Sentiment analysis pipeline: classifies text as negative, neutral or positive.
//!
//! The pipeline loads a pretrained BERT encoder and tokenizer by name, applies
//! a trained checkpoint holding the encoder and a three-way classification
//! head, and then answers one question per call: which of the three labels
//! fits this text best.
//!
//! ## Main Types
//!
//! - [`SentimentAnalysisPipeline`] - High-level interface for sentiment classification
//! - [`SentimentAnalysisPipelineBuilder`] - Builder pattern for pipeline configuration
//! - [`SentimentAnalysisModel`] - Trait for sentiment analysis model implementations
//! - [`Sentiment`] - The fixed, ordered label set
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use sentiment_analyzer::pipelines::sentiment_analysis_pipeline::*;
//!
//! // `model_config.yaml` names the encoder and the checkpoint:
//! //   PRE_TRAINED_MODEL_NAME: bert-base-cased
//! //   best_model_path: best_model_state.bin
//! let pipeline = SentimentAnalysisPipelineBuilder::from_config_file("bert_model/model_config.yaml")?
//!     .cpu()
//!     .build()?;
//!
//! let label = pipeline.predict("I love this product!")?;
//! println!("Sentiment: {label}");
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod builder;
pub mod model;
pub mod pipeline;
pub mod preprocess;

pub use builder::SentimentAnalysisPipelineBuilder;
pub use model::SentimentAnalysisModel;
pub use pipeline::{SentimentAnalysisPipeline, SentimentResult, MAX_SEQ_LEN};
pub use preprocess::preprocess;

pub use crate::core::Sentiment;
pub use crate::pipelines::utils::DeviceSelectable;

pub use anyhow::Result;
