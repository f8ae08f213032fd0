use super::model::SentimentAnalysisModel;
use super::preprocess::preprocess;
use crate::core::Sentiment;
use crate::models::BertSentimentModel;
use candle_core::{DType, Tensor, D};
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Every input is padded or truncated to exactly this many tokens.
pub const MAX_SEQ_LEN: usize = 60;

const DEFAULT_PAD_TOKEN: &str = "[PAD]";

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SentimentResult {
    pub sentiment: Sentiment,
    pub label: String,
    /// Softmax probability of `sentiment`.
    pub score: f32,
}

pub struct SentimentAnalysisPipeline<M: SentimentAnalysisModel = BertSentimentModel> {
    pub(crate) model: M,
    pub(crate) tokenizer: Tokenizer,
}

impl<M: SentimentAnalysisModel> SentimentAnalysisPipeline<M> {
    /// Wraps a model and its tokenizer. The tokenizer is reconfigured for
    /// fixed-length [`MAX_SEQ_LEN`] padding and truncation; `fallback_pad_id` is
    /// used when its vocabulary has no `[PAD]` token.
    pub fn new(model: M, mut tokenizer: Tokenizer, fallback_pad_id: u32) -> anyhow::Result<Self> {
        let (pad_id, pad_token) = match tokenizer.token_to_id(DEFAULT_PAD_TOKEN) {
            Some(id) => (id, DEFAULT_PAD_TOKEN.to_string()),
            None => (
                fallback_pad_id,
                tokenizer
                    .id_to_token(fallback_pad_id)
                    .unwrap_or_else(|| DEFAULT_PAD_TOKEN.to_string()),
            ),
        };

        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(MAX_SEQ_LEN),
            pad_id,
            pad_token,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(anyhow::Error::msg)?;

        Ok(Self { model, tokenizer })
    }

    /// Preprocesses and tokenizes `text` into a [`MAX_SEQ_LEN`]-long encoding
    /// with special tokens and an attention mask.
    pub fn encode(&self, text: &str) -> anyhow::Result<Encoding> {
        let preprocessed = preprocess(text);
        self.tokenizer
            .encode(preprocessed, true)
            .map_err(|e| anyhow::anyhow!("Tokenization error: {e}"))
    }

    /// Predict the sentiment label (`"negative"`, `"neutral"` or `"positive"`).
    pub fn predict(&self, text: &str) -> anyhow::Result<String> {
        Ok(self.predict_with_score(text)?.label)
    }

    /// Predict sentiment with structured result containing label and confidence score
    pub fn predict_with_score(&self, text: &str) -> anyhow::Result<SentimentResult> {
        let preprocessed = preprocess(text);
        tracing::debug!(text = %preprocessed, "review text");

        let encoding = self
            .tokenizer
            .encode(preprocessed.as_str(), true)
            .map_err(|e| anyhow::anyhow!("Tokenization error: {e}"))?;

        let device = self.model.device();
        let input_ids = Tensor::new(encoding.get_ids(), device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(encoding.get_attention_mask(), device)?.unsqueeze(0)?;

        let scores = self
            .model
            .forward(&input_ids, &attention_mask)?
            .squeeze(0)?
            .to_dtype(DType::F32)?;
        let probabilities: Vec<f32> = candle_nn::ops::softmax(&scores, D::Minus1)?.to_vec1()?;
        let scores: Vec<f32> = scores.to_vec1()?;

        anyhow::ensure!(
            scores.len() == Sentiment::COUNT,
            "model produced {} scores, expected {}",
            scores.len(),
            Sentiment::COUNT
        );

        let index = argmax(&scores);
        let sentiment = Sentiment::from_index(index)
            .ok_or_else(|| anyhow::anyhow!("Predicted index {index} has no sentiment label"))?;

        tracing::info!(sentiment = %sentiment, "prediction");

        Ok(SentimentResult {
            sentiment,
            label: sentiment.as_str().to_string(),
            score: probabilities[index],
        })
    }

    pub fn device(&self) -> &candle_core::Device {
        self.model.device()
    }
}

/// Index of the largest score; the lowest index wins ties.
pub(crate) fn argmax(scores: &[f32]) -> usize {
    let mut best = 0;
    for (i, score) in scores.iter().enumerate().skip(1) {
        if *score > scores[best] {
            best = i;
        }
    }
    best
}
