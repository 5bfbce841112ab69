//! Text → polarity estimators.
//!
//! The pipeline only needs some deterministic `text -> [-1, 1]` function;
//! which one is picked by [`SentimentSource`](crate::config::SentimentSource).

mod lexicon;
mod remote;

pub use lexicon::LexiconSentiment;
pub use remote::ProviderSentiment;

use async_trait::async_trait;

use crate::error::ScoringError;

#[async_trait]
pub trait SentimentScorer: Send + Sync {
    /// Polarity of `text` in `[-1.0, 1.0]`.
    async fn score(&self, text: &str) -> Result<f64, ScoringError>;

    /// Polarities for many texts, one per input, in input order.
    async fn score_batch(&self, texts: &[String]) -> Result<Vec<f64>, ScoringError> {
        let mut polarities = Vec::with_capacity(texts.len());
        for text in texts {
            polarities.push(self.score(text).await?);
        }
        Ok(polarities)
    }
}
