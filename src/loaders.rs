//! Tokenizer, encoder and weight loading.
//!
//! The predictor never talks to the Hugging Face Hub or the filesystem
//! directly; it asks a [`ModelProvider`] for the two pretrained pieces it
//! needs by name:
//!
//! - [`HubModelProvider`] resolves names against the Hugging Face Hub (files
//!   are cached in the standard `~/.cache/huggingface/hub` location).
//! - [`LocalModelProvider`] reads the same files from a directory on disk.
//!
//! Pretrained encoder weights are only fetched on request, for checkpoints
//! that hold nothing but the fine-tuned part of the model.
//!
//! [`read_weight_file`] turns a `.safetensors` or PyTorch pickle file into a
//! name -> tensor map; it is shared by encoder weights and checkpoints.

use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use candle_transformers::models::bert::Config as BertConfig;
use hf_hub::api::sync::Api as HfApi;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::processors::bert::BertProcessing;
use tokenizers::Tokenizer;

pub const CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";
pub const VOCAB_FILE: &str = "vocab.txt";
pub const SAFETENSORS_WEIGHTS_FILE: &str = "model.safetensors";
pub const PYTORCH_WEIGHTS_FILE: &str = "pytorch_model.bin";

/// Architecture of a named BERT encoder.
#[derive(Debug, Clone)]
pub struct PretrainedEncoder {
    pub name: String,
    pub config: BertConfig,
}

/// Resolves pretrained encoders and their tokenizers by name.
pub trait ModelProvider {
    fn load_tokenizer(&self, name: &str) -> Result<Tokenizer>;

    fn load_encoder(&self, name: &str) -> Result<PretrainedEncoder>;

    /// Path of the encoder's pretrained weights, `None` when the provider has
    /// none for `name`.
    fn pretrained_weights(&self, name: &str) -> Result<Option<PathBuf>>;
}

#[derive(Debug, Clone)]
pub struct HfLoader {
    pub repo: String,
    pub filename: String,
}

impl HfLoader {
    pub fn new(repo: &str, filename: &str) -> Self {
        Self {
            repo: repo.into(),
            filename: filename.into(),
        }
    }

    pub fn load(&self) -> Result<PathBuf> {
        let hf_api = HfApi::new()?;
        let hf_api = hf_api.model(self.repo.clone());

        let path = hf_api
            .get(self.filename.as_str())
            .with_context(|| format!("failed to fetch {} from {}", self.filename, self.repo))?;

        tracing::debug!(repo = %self.repo, file = %self.filename, path = %path.display(), "resolved hub file");
        Ok(path)
    }
}

#[derive(Clone)]
pub struct TokenizerLoader {
    pub tokenizer_file_loader: HfLoader,
}

impl TokenizerLoader {
    pub fn new(repo: &str, filename: &str) -> Self {
        let tokenizer_file_loader = HfLoader::new(repo, filename);

        Self {
            tokenizer_file_loader,
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let tokenizer_file_path = self.tokenizer_file_loader.load()?;

        Tokenizer::from_file(tokenizer_file_path).map_err(anyhow::Error::msg)
    }
}

/// Loads encoders and tokenizers from the Hugging Face Hub.
#[derive(Debug, Clone, Default)]
pub struct HubModelProvider;

impl HubModelProvider {
    pub fn new() -> Self {
        Self
    }
}

impl ModelProvider for HubModelProvider {
    fn load_tokenizer(&self, name: &str) -> Result<Tokenizer> {
        match TokenizerLoader::new(name, TOKENIZER_FILE).load() {
            Ok(tokenizer) => Ok(tokenizer),
            Err(e) => {
                tracing::warn!(repo = name, error = %e, "no tokenizer.json, building from vocab.txt");
                let vocab = HfLoader::new(name, VOCAB_FILE).load()?;
                let lowercase = HfLoader::new(name, TOKENIZER_CONFIG_FILE)
                    .load()
                    .ok()
                    .and_then(|path| do_lower_case(&path))
                    .unwrap_or_else(|| lowercase_for(name));
                wordpiece_tokenizer(&vocab, lowercase)
            }
        }
    }

    fn load_encoder(&self, name: &str) -> Result<PretrainedEncoder> {
        let config = read_bert_config(&HfLoader::new(name, CONFIG_FILE).load()?)?;

        Ok(PretrainedEncoder {
            name: name.to_string(),
            config,
        })
    }

    fn pretrained_weights(&self, name: &str) -> Result<Option<PathBuf>> {
        match HfLoader::new(name, SAFETENSORS_WEIGHTS_FILE).load() {
            Ok(safetensors) => Ok(Some(safetensors)),
            Err(_) => match HfLoader::new(name, PYTORCH_WEIGHTS_FILE).load() {
                Ok(pytorch_model) => Ok(Some(pytorch_model)),
                Err(e) => {
                    anyhow::bail!("Encoder weights not found in repo {name}. Expected `{SAFETENSORS_WEIGHTS_FILE}` or `{PYTORCH_WEIGHTS_FILE}`. Error: {e}")
                }
            },
        }
    }
}

/// Loads encoders and tokenizers from a directory holding `config.json`,
/// `tokenizer.json` (or `vocab.txt`) and optionally the encoder weights.
///
/// The model name is ignored apart from being carried along for logging.
#[derive(Debug, Clone)]
pub struct LocalModelProvider {
    dir: PathBuf,
}

impl LocalModelProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ModelProvider for LocalModelProvider {
    fn load_tokenizer(&self, name: &str) -> Result<Tokenizer> {
        let tokenizer_json = self.dir.join(TOKENIZER_FILE);
        if tokenizer_json.exists() {
            return Tokenizer::from_file(&tokenizer_json).map_err(anyhow::Error::msg);
        }

        let vocab = self.dir.join(VOCAB_FILE);
        if vocab.exists() {
            let lowercase = do_lower_case(&self.dir.join(TOKENIZER_CONFIG_FILE))
                .unwrap_or_else(|| lowercase_for(name));
            return wordpiece_tokenizer(&vocab, lowercase);
        }

        anyhow::bail!(
            "No tokenizer found in {:?} (tried {TOKENIZER_FILE}, {VOCAB_FILE})",
            self.dir
        )
    }

    fn load_encoder(&self, name: &str) -> Result<PretrainedEncoder> {
        let config = read_bert_config(&self.dir.join(CONFIG_FILE))?;

        Ok(PretrainedEncoder {
            name: name.to_string(),
            config,
        })
    }

    fn pretrained_weights(&self, _name: &str) -> Result<Option<PathBuf>> {
        Ok([SAFETENSORS_WEIGHTS_FILE, PYTORCH_WEIGHTS_FILE]
            .iter()
            .map(|file| self.dir.join(file))
            .find(|path| path.exists()))
    }
}

fn read_bert_config(path: &Path) -> Result<BertConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read encoder config {path:?}"))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse encoder config {path:?}"))
}

/// `do_lower_case` from a `tokenizer_config.json`, if the file has it.
fn do_lower_case(path: &Path) -> Option<bool> {
    let content = std::fs::read_to_string(path).ok()?;
    let config: serde_json::Value = serde_json::from_str(&content).ok()?;
    config.get("do_lower_case")?.as_bool()
}

/// Guess from the model name when no tokenizer config says otherwise.
fn lowercase_for(name: &str) -> bool {
    !name
        .split(['/', '-', '_'])
        .any(|part| part.eq_ignore_ascii_case("cased"))
}

/// Builds a BERT WordPiece tokenizer from a `vocab.txt` file, for repos that
/// predate `tokenizer.json`.
pub fn wordpiece_tokenizer(vocab_path: &Path, lowercase: bool) -> Result<Tokenizer> {
    let wordpiece = WordPiece::from_file(&vocab_path.to_string_lossy())
        .unk_token("[UNK]".to_string())
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build WordPiece model: {e}"))?;

    let mut tokenizer = Tokenizer::new(wordpiece);
    tokenizer.with_normalizer(Some(BertNormalizer::new(true, true, None, lowercase)));
    tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));

    let special = |token: &str| {
        tokenizer
            .token_to_id(token)
            .map(|id| (token.to_string(), id))
            .ok_or_else(|| anyhow::anyhow!("special token {token} missing from {vocab_path:?}"))
    };
    let sep = special("[SEP]")?;
    let cls = special("[CLS]")?;
    tokenizer.with_post_processor(Some(BertProcessing::new(sep, cls)));

    Ok(tokenizer)
}

/// Reads every tensor from a weight file. The format is picked from the
/// extension: `.safetensors`, otherwise a PyTorch pickle (`.bin`, `.pt`,
/// `.pth`, ...).
pub fn read_weight_file(path: &Path) -> Result<HashMap<String, Tensor>> {
    let is_safetensors = path.extension().is_some_and(|ext| ext == "safetensors");

    let tensors = if is_safetensors {
        candle_core::safetensors::load(path, &Device::Cpu)
            .with_context(|| format!("Failed to read safetensors file {path:?}"))?
    } else {
        candle_core::pickle::read_all(path)
            .with_context(|| format!("Failed to read PyTorch weights {path:?}"))?
            .into_iter()
            .collect()
    };

    tracing::debug!(path = %path.display(), tensors = tensors.len(), "read weight file");
    Ok(tensors)
}
