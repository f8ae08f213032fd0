//! Offline fixtures: a tiny WordPiece vocabulary, a tiny BERT config and a
//! randomly initialised checkpoint saved as safetensors.

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use candle_transformers::models::bert::Config;
use sentiment_analyzer::models::SentimentClassifier;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const MODEL_NAME: &str = "tiny-bert";

pub const VOCAB: &[&str] = &[
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "great", "movie", "terrible", "film", "the", "is",
    "okay", "good",
];
pub const PAD_ID: u32 = 0;
pub const CLS_ID: u32 = 2;
pub const SEP_ID: u32 = 3;

pub fn config_json() -> String {
    format!(
        r#"{{
  "vocab_size": {},
  "hidden_size": 8,
  "num_hidden_layers": 1,
  "num_attention_heads": 2,
  "intermediate_size": 16,
  "hidden_act": "gelu",
  "hidden_dropout_prob": 0.1,
  "max_position_embeddings": 64,
  "type_vocab_size": 2,
  "initializer_range": 0.02,
  "layer_norm_eps": 1e-12,
  "pad_token_id": 0,
  "model_type": "bert"
}}"#,
        VOCAB.len()
    )
}

pub struct Fixture {
    // Keeps the files alive for the duration of the test.
    _dir: TempDir,
    pub model_dir: PathBuf,
    pub config_path: PathBuf,
    pub checkpoint: PathBuf,
}

/// Writes a model directory, a checkpoint whose head has `num_labels`
/// outputs, and a `model_config.yaml` pointing at both.
pub fn fixture(num_labels: usize) -> anyhow::Result<Fixture> {
    let dir = tempfile::tempdir()?;

    let model_dir = dir.path().join(MODEL_NAME);
    std::fs::create_dir_all(&model_dir)?;
    std::fs::write(model_dir.join("vocab.txt"), VOCAB.join("\n"))?;
    std::fs::write(model_dir.join("config.json"), config_json())?;

    let checkpoint = dir.path().join("best_model_state.safetensors");
    write_checkpoint(&checkpoint, num_labels)?;

    let config_path = dir.path().join("model_config.yaml");
    std::fs::write(
        &config_path,
        format!(
            "PRE_TRAINED_MODEL_NAME: {MODEL_NAME}\nbest_model_path: best_model_state.safetensors\n"
        ),
    )?;

    Ok(Fixture {
        _dir: dir,
        model_dir,
        config_path,
        checkpoint,
    })
}

pub fn write_checkpoint(path: &Path, num_labels: usize) -> anyhow::Result<()> {
    random_classifier(1, num_labels)?.save(path)?;
    Ok(())
}

/// Randomly initialised classifier weights for the fixture's encoder, with
/// `num_hidden_layers` overriding the one in `config.json`.
pub fn random_classifier(num_hidden_layers: usize, num_labels: usize) -> anyhow::Result<VarMap> {
    let mut config: Config = serde_json::from_str(&config_json())?;
    config.num_hidden_layers = num_hidden_layers;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    SentimentClassifier::load(vb, &config, num_labels)?;
    Ok(varmap)
}

/// Saves the tensors of `varmap` that `rename` maps to a name.
pub fn save_renamed(
    varmap: &VarMap,
    path: &Path,
    rename: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| anyhow::anyhow!("varmap lock poisoned"))?;
    let tensors: HashMap<String, candle_core::Tensor> = data
        .iter()
        .filter_map(|(name, var)| rename(name).map(|name| (name, var.as_tensor().clone())))
        .collect();
    candle_core::safetensors::save(&tensors, path)?;
    Ok(())
}

/// Only the classification head.
pub fn head_only(name: &str) -> Option<String> {
    name.starts_with("out.").then(|| name.to_string())
}

/// The encoder as a Hub `model.safetensors` names it: no `bert.` prefix and
/// `gamma`/`beta` LayerNorm parameters.
pub fn hub_encoder_name(name: &str) -> Option<String> {
    let bare = name.strip_prefix("bert.")?;
    let renamed = if let Some(stem) = bare.strip_suffix("LayerNorm.weight") {
        format!("{stem}LayerNorm.gamma")
    } else if let Some(stem) = bare.strip_suffix("LayerNorm.bias") {
        format!("{stem}LayerNorm.beta")
    } else {
        bare.to_string()
    };
    Some(renamed)
}

/// Writes `varmap`'s encoder into `model_dir` as Hub-style pretrained
/// weights, alongside a pretraining head tensor the classifier never uses.
pub fn write_pretrained(varmap: &VarMap, model_dir: &Path) -> anyhow::Result<()> {
    let path = model_dir.join("model.safetensors");
    {
        let data = varmap
            .data()
            .lock()
            .map_err(|_| anyhow::anyhow!("varmap lock poisoned"))?;
        let mut tensors: HashMap<String, candle_core::Tensor> = data
            .iter()
            .filter_map(|(name, var)| {
                hub_encoder_name(name).map(|name| (name, var.as_tensor().clone()))
            })
            .collect();
        tensors.insert(
            "cls.predictions.bias".to_string(),
            candle_core::Tensor::zeros(VOCAB.len(), DType::F32, &Device::Cpu)?,
        );
        candle_core::safetensors::save(&tensors, &path)?;
    }
    Ok(())
}

/// Config in memory pointing at `checkpoint`.
pub fn config_for(checkpoint: &Path) -> HashMap<String, String> {
    let mut config = HashMap::new();
    config.insert("PRE_TRAINED_MODEL_NAME".to_string(), MODEL_NAME.to_string());
    config.insert(
        "best_model_path".to_string(),
        checkpoint.to_string_lossy().into_owned(),
    );
    config
}

/// The PyTorch (`torch.save`) state dict committed under `tests/fixtures`,
/// matching the fixture's `config.json` and vocabulary.
pub fn pytorch_checkpoint() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/tiny_bert_state.bin")
}
