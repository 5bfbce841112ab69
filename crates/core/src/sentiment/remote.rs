use async_trait::async_trait;
use tracing::debug;

use super::SentimentScorer;
use crate::{error::ScoringError, provider::Provider};

static SENTIMENT_PROMPT: &str = r#"
  You are a sentiment analyzer.

  INPUT: JSON array of transcript snippets.

  OUTPUT: Return ONLY a JSON array of numbers, one per snippet, in the same order.
  Each number is the snippet's sentiment polarity between -1.0 (very negative)
  and 1.0 (very positive); 0.0 means neutral or mixed.

  RULES:
  - The output array MUST have exactly as many entries as the input array
  - Output ONLY the JSON array, nothing else
"#;

/// Scores a whole transcript in one chat-completions request.
pub struct ProviderSentiment {
    provider: Provider,
    client: reqwest::Client,
}

impl ProviderSentiment {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SentimentScorer for ProviderSentiment {
    async fn score(&self, text: &str) -> Result<f64, ScoringError> {
        let polarities = self.score_batch(&[text.to_string()]).await?;
        polarities
            .first()
            .copied()
            .ok_or(ScoringError::CountMismatch {
                expected: 1,
                actual: 0,
            })
    }

    async fn score_batch(&self, texts: &[String]) -> Result<Vec<f64>, ScoringError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let config = self.provider.config();
        let api_key = self.provider.validate_api_key()?;
        let user_prompt = serde_json::to_string_pretty(texts)?;

        debug!(
            provider = self.provider.name(),
            count = texts.len(),
            "requesting batched sentiment"
        );

        let response = self
            .client
            .post(config.api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&serde_json::json!({
                "model": config.model,
                "messages": [
                    {
                        "role": "system",
                        "content": SENTIMENT_PROMPT,
                    },
                    {
                        "role": "user",
                        "content": user_prompt,
                    },
                ],
                "temperature": 0.1,
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        // Extract content from response
        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                ScoringError::InvalidApiResponse(format!("Invalid API response: {:?}", response))
            })?;

        parse_polarities(content, texts.len())
    }
}

/// Parse the model's answer, tolerating a fenced code block around the array.
pub(crate) fn parse_polarities(content: &str, expected: usize) -> Result<Vec<f64>, ScoringError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let values: Vec<f64> = serde_json::from_str(body)?;
    if values.len() != expected {
        return Err(ScoringError::CountMismatch {
            expected,
            actual: values.len(),
        });
    }

    values
        .into_iter()
        .map(|v| {
            if v.is_finite() {
                Ok(v.clamp(-1.0, 1.0))
            } else {
                Err(ScoringError::InvalidApiResponse(format!(
                    "non-finite polarity {v}"
                )))
            }
        })
        .collect()
}
