pub mod bert_sentiment;
pub mod checkpoint;

pub use bert_sentiment::{BertPooler, BertSentimentModel, SentimentClassifier, DROPOUT_PROB};
