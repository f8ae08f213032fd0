use anyhow::Result;
use clap::Parser;
use sentiment_analyzer::core::ConfigurationManager;
use sentiment_analyzer::pipelines::sentiment_analysis_pipeline::*;
use std::io::BufRead;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

/// Classify text as negative, neutral or positive.
///
/// Reads the text from the positional argument, or one text per line from
/// stdin when none is given.
#[derive(Debug, Parser)]
#[command(name = "sentiment", version)]
struct Args {
    /// Path to the model's YAML config (`PRE_TRAINED_MODEL_NAME`, `best_model_path`).
    #[arg(long, conflicts_with = "config_dir")]
    config: Option<PathBuf>,

    /// Root directory holding one sub-directory of configuration per model.
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Sub-directory of `--config-dir` for the model in use.
    #[arg(long, default_value = "bert_model")]
    model: String,

    /// Load encoder config and tokenizer from this directory instead of the Hub.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Accept a checkpoint holding only part of the encoder; the pretrained
    /// encoder weights fill in the rest.
    #[arg(long)]
    allow_partial_checkpoint: bool,

    /// Run on the CPU even when CUDA is available.
    #[arg(long)]
    cpu: bool,

    /// Print the softmax probability next to the label.
    #[arg(long)]
    score: bool,

    /// Text to classify.
    text: Option<String>,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut builder = match &args.config {
        Some(path) => SentimentAnalysisPipelineBuilder::from_config_file(path)?,
        None => SentimentAnalysisPipelineBuilder::from_config(
            &ConfigurationManager::new(&args.config_dir, &args.model).load()?,
        )?,
    };
    if let Some(dir) = &args.model_dir {
        builder = builder.local_model_dir(dir);
    }
    if args.allow_partial_checkpoint {
        builder = builder.allow_partial_checkpoint();
    }
    if args.cpu {
        builder = builder.cpu();
    }

    let pipeline = builder.build()?;

    match &args.text {
        Some(text) => print_prediction(&pipeline, text, args.score),
        None => {
            for line in std::io::stdin().lock().lines() {
                print_prediction(&pipeline, &line?, args.score)?;
            }
            Ok(())
        }
    }
}

fn print_prediction(
    pipeline: &SentimentAnalysisPipeline,
    text: &str,
    with_score: bool,
) -> Result<()> {
    let result = pipeline.predict_with_score(text)?;
    if with_score {
        println!("{}\t{:.4}", result.label, result.score);
    } else {
        println!("{}", result.label);
    }
    Ok(())
}
