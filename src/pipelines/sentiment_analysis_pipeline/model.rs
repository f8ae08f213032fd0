use candle_core::{Device, Tensor};

pub trait SentimentAnalysisModel {
    /// Raw class scores for a batch of token ids and attention masks, shape
    /// `(batch, Sentiment::COUNT)`. Must run in inference mode.
    fn forward(&self, input_ids: &Tensor, attention_mask: &Tensor) -> anyhow::Result<Tensor>;

    fn device(&self) -> &Device;
}
