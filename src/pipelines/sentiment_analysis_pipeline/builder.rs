use super::pipeline::SentimentAnalysisPipeline;
use crate::core::{ConfigProvider, ModelSettings, YamlConfig};
use crate::loaders::{HubModelProvider, LocalModelProvider, ModelProvider};
use crate::models::BertSentimentModel;
use crate::pipelines::utils::{DeviceRequest, DeviceSelectable};
use std::path::{Path, PathBuf};

pub struct SentimentAnalysisPipelineBuilder {
    settings: ModelSettings,
    provider: Box<dyn ModelProvider>,
    device_request: DeviceRequest,
    partial_checkpoint: bool,
}

impl SentimentAnalysisPipelineBuilder {
    /// Starts from already resolved settings, fetching the encoder and
    /// tokenizer from the Hugging Face Hub.
    pub fn new(settings: ModelSettings) -> Self {
        Self {
            settings,
            provider: Box::new(HubModelProvider::new()),
            device_request: DeviceRequest::Default,
            partial_checkpoint: false,
        }
    }

    /// Resolves `PRE_TRAINED_MODEL_NAME` and `best_model_path` from `config`.
    pub fn from_config(config: &dyn ConfigProvider) -> anyhow::Result<Self> {
        Ok(Self::new(ModelSettings::resolve(config)?))
    }

    /// Reads the settings from a YAML file such as `model_config.yaml`.
    pub fn from_config_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Self::from_config(&YamlConfig::from_file(path)?)
    }

    pub fn model_provider(mut self, provider: impl ModelProvider + 'static) -> Self {
        self.provider = Box::new(provider);
        self
    }

    /// Load the encoder config and tokenizer from a local directory instead
    /// of the Hub.
    pub fn local_model_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.model_provider(LocalModelProvider::new(dir))
    }

    /// Accept a checkpoint that only holds part of the encoder. The rest comes
    /// from the provider's pretrained weights, which are then required.
    pub fn allow_partial_checkpoint(mut self) -> Self {
        self.partial_checkpoint = true;
        self
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn build(self) -> anyhow::Result<SentimentAnalysisPipeline<BertSentimentModel>> {
        let ModelSettings {
            pretrained_model_name: name,
            best_model_path,
        } = self.settings;

        // Fail before any download when the checkpoint cannot be there.
        anyhow::ensure!(
            best_model_path.is_file(),
            "Checkpoint not found at {best_model_path:?}"
        );

        let device = self.device_request.resolve()?;
        tracing::info!(encoder = %name, device = ?device.location(), "building sentiment pipeline");

        let tokenizer = self.provider.load_tokenizer(&name)?;
        let encoder = self.provider.load_encoder(&name)?;
        let pad_id = encoder.config.pad_token_id as u32;

        let pretrained_weights = if self.partial_checkpoint {
            let weights = self.provider.pretrained_weights(&name)?;
            anyhow::ensure!(
                weights.is_some(),
                "A partial checkpoint needs pretrained weights for {name}, none found"
            );
            weights
        } else {
            None
        };

        let model = BertSentimentModel::load(
            &encoder,
            pretrained_weights.as_deref(),
            &best_model_path,
            device,
        )?;
        SentimentAnalysisPipeline::new(model, tokenizer, pad_id)
    }
}

impl DeviceSelectable for SentimentAnalysisPipelineBuilder {
    fn device_request_mut(&mut self) -> &mut DeviceRequest {
        &mut self.device_request
    }
}
