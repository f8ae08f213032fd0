//! BERT encoder with a three-way sentiment head.
//!
//! ```text
//! [input_ids] ──> BertModel ──> BertPooler ──> dropout(0.3) ──> out ──> scores (batch, 3)
//! [attention_mask]              ([CLS] -> dense -> tanh)
//! ```
//!
//! Parameter names follow the training-time module layout: encoder under
//! `bert.*` (pooler under `bert.pooler.dense.*`), head under `out.*`.

use super::checkpoint::{self, TrackedTensors};
use crate::core::Sentiment;
use crate::loaders::{read_weight_file, PretrainedEncoder};
use crate::pipelines::sentiment_analysis_pipeline::SentimentAnalysisModel;
use anyhow::{Context, Result as AnyhowResult};
use candle_core::{DType, Device, IndexOp, Result, Tensor};
use candle_nn::{linear, Dropout, Linear, Module, ModuleT, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config};
use std::collections::HashSet;
use std::path::Path;

/// Drop probability of the head's dropout layer. Only relevant when training.
pub const DROPOUT_PROB: f32 = 0.3;

/// Maps the `[CLS]` hidden state to the sequence-level pooled output.
#[derive(Clone)]
pub struct BertPooler {
    dense: Linear,
}

impl BertPooler {
    pub fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        let dense = linear(config.hidden_size, config.hidden_size, vb.pp("dense"))?;
        Ok(Self { dense })
    }
}

impl Module for BertPooler {
    fn forward(&self, hidden_states: &Tensor) -> Result<Tensor> {
        // (batch, seq_len, hidden) -> (batch, hidden)
        let first_token = hidden_states.i((.., 0))?;
        self.dense.forward(&first_token)?.tanh()
    }
}

pub struct SentimentClassifier {
    bert: BertModel,
    pooler: BertPooler,
    drop: Dropout,
    out: Linear,
}

impl SentimentClassifier {
    pub fn load(vb: VarBuilder, config: &Config, num_labels: usize) -> Result<Self> {
        let bert = BertModel::load(vb.pp("bert"), config)?;
        let pooler = BertPooler::load(vb.pp("bert").pp("pooler"), config)?;
        let drop = Dropout::new(DROPOUT_PROB);
        let out = linear(config.hidden_size, num_labels, vb.pp("out"))?;

        Ok(Self {
            bert,
            pooler,
            drop,
            out,
        })
    }

    /// Raw class scores of shape `(batch, num_labels)`.
    ///
    /// `train = false` turns dropout into the identity.
    pub fn forward_t(
        &self,
        input_ids: &Tensor,
        attention_mask: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        let token_type_ids = input_ids.zeros_like()?;
        let sequence_output = self
            .bert
            .forward(input_ids, &token_type_ids, Some(attention_mask))?;
        let pooled_output = self.pooler.forward(&sequence_output)?;
        let output = self.drop.forward_t(&pooled_output, train)?;
        self.out.forward(&output)
    }

    pub fn num_labels(&self) -> usize {
        self.out.weight().dim(0).unwrap_or(0)
    }
}

/// Inference-only sentiment model: a [`SentimentClassifier`] whose weights
/// come from a trained checkpoint, optionally laid over the pretrained
/// encoder weights.
pub struct BertSentimentModel {
    classifier: SentimentClassifier,
    device: Device,
}

impl BertSentimentModel {
    /// Loads the checkpoint at `checkpoint_path`.
    ///
    /// Without `pretrained_weights` the checkpoint must hold exactly the
    /// tensors the model uses. With them, it may leave encoder tensors out and
    /// the pretrained ones fill in. A checkpoint tensor the model does not use
    /// fails either way.
    pub fn load(
        encoder: &PretrainedEncoder,
        pretrained_weights: Option<&Path>,
        checkpoint_path: &Path,
        device: Device,
    ) -> AnyhowResult<Self> {
        let pretrained = match pretrained_weights {
            Some(path) => read_weight_file(path).with_context(|| {
                format!("Failed to load pretrained weights for {}", encoder.name)
            })?,
            None => Default::default(),
        };
        let trained = read_weight_file(checkpoint_path)
            .with_context(|| format!("Failed to load checkpoint {checkpoint_path:?}"))?;

        checkpoint::check_head(&trained, encoder.config.hidden_size, Sentiment::COUNT)?;
        let trained_names: HashSet<String> =
            trained.keys().map(|name| checkpoint::normalize_name(name)).collect();
        let tensors = checkpoint::merge(pretrained, trained);

        // A VarBuilder over plain tensors never creates `Var`s, so nothing
        // loaded here can take part in gradient tracking.
        let (backend, requested) = TrackedTensors::new(tensors);
        let vb = VarBuilder::from_backend(Box::new(backend), DType::F32, device.clone());
        let classifier = SentimentClassifier::load(vb, &encoder.config, Sentiment::COUNT)
            .with_context(|| {
                format!(
                    "Checkpoint {checkpoint_path:?} does not match encoder {}",
                    encoder.name
                )
            })?;

        {
            let requested = requested
                .lock()
                .map_err(|_| anyhow::anyhow!("tensor name registry poisoned"))?;
            checkpoint::check_coverage(&trained_names, &requested, pretrained_weights.is_none())
                .with_context(|| {
                    format!(
                        "Checkpoint {checkpoint_path:?} does not match encoder {}",
                        encoder.name
                    )
                })?;
        }

        anyhow::ensure!(
            classifier.num_labels() == Sentiment::COUNT,
            "classification head has {} outputs, expected {}",
            classifier.num_labels(),
            Sentiment::COUNT
        );

        tracing::info!(
            encoder = %encoder.name,
            checkpoint = %checkpoint_path.display(),
            pretrained = pretrained_weights.is_some(),
            hidden_size = encoder.config.hidden_size,
            "loaded sentiment classifier"
        );

        Ok(Self { classifier, device })
    }

}

impl SentimentAnalysisModel for BertSentimentModel {
    fn forward(&self, input_ids: &Tensor, attention_mask: &Tensor) -> AnyhowResult<Tensor> {
        Ok(self.classifier.forward_t(input_ids, attention_mask, false)?)
    }

    fn device(&self) -> &Device {
        &self.device
    }
}
