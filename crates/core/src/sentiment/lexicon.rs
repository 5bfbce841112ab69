use std::collections::HashMap;

use async_trait::async_trait;

use super::SentimentScorer;
use crate::error::ScoringError;

const POLARITY: &[(&str, f64)] = &[
    ("absolute", 0.2),
    ("amazing", 0.6),
    ("awesome", 1.0),
    ("beautiful", 0.85),
    ("best", 1.0),
    ("better", 0.5),
    ("brilliant", 0.9),
    ("clear", 0.1),
    ("cool", 0.35),
    ("delighted", 0.7),
    ("easy", 0.43),
    ("excellent", 1.0),
    ("excited", 0.4),
    ("exciting", 0.3),
    ("fantastic", 0.4),
    ("favorite", 0.5),
    ("fun", 0.3),
    ("glad", 0.5),
    ("good", 0.7),
    ("great", 0.8),
    ("happy", 0.8),
    ("helpful", 0.5),
    ("important", 0.4),
    ("impressive", 1.0),
    ("incredible", 0.9),
    ("interesting", 0.5),
    ("love", 0.5),
    ("lovely", 0.5),
    ("lucky", 0.33),
    ("nice", 0.6),
    ("perfect", 1.0),
    ("pleased", 0.5),
    ("powerful", 0.3),
    ("proud", 0.8),
    ("remarkable", 0.75),
    ("success", 0.3),
    ("successful", 0.75),
    ("superb", 1.0),
    ("thank", 0.2),
    ("thanks", 0.2),
    ("useful", 0.3),
    ("valuable", 0.6),
    ("win", 0.8),
    ("wonderful", 1.0),
    ("angry", -0.5),
    ("annoying", -0.8),
    ("awful", -1.0),
    ("bad", -0.7),
    ("boring", -1.0),
    ("broken", -0.4),
    ("confusing", -0.3),
    ("dangerous", -0.6),
    ("difficult", -0.5),
    ("disappointed", -0.75),
    ("disappointing", -0.6),
    ("fail", -0.5),
    ("failed", -0.5),
    ("failure", -0.32),
    ("hard", -0.29),
    ("hate", -0.8),
    ("horrible", -1.0),
    ("lost", -0.4),
    ("pain", -0.5),
    ("poor", -0.4),
    ("problem", -0.3),
    ("sad", -0.5),
    ("scary", -0.5),
    ("stupid", -0.8),
    ("terrible", -1.0),
    ("ugly", -0.7),
    ("unfortunately", -0.5),
    ("useless", -0.5),
    ("worse", -0.4),
    ("worst", -1.0),
    ("wrong", -0.5),
];

const INTENSIFIERS: &[(&str, f64)] = &[
    ("absolutely", 1.4),
    ("extremely", 1.5),
    ("incredibly", 1.5),
    ("quite", 1.1),
    ("really", 1.3),
    ("slightly", 0.7),
    ("so", 1.2),
    ("somewhat", 0.8),
    ("super", 1.4),
    ("totally", 1.3),
    ("very", 1.3),
];

const NEGATORS: &[&str] = &["no", "not", "never", "nothing", "cannot"];

/// Local, deterministic lexicon estimator.
///
/// Averages the polarity of known words. An intensifier right before a word
/// scales it; a negator anywhere since the previous polarity word flips it
/// and halves it.
pub struct LexiconSentiment {
    polarity: HashMap<&'static str, f64>,
    intensifiers: HashMap<&'static str, f64>,
}

impl Default for LexiconSentiment {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconSentiment {
    pub fn new() -> Self {
        Self {
            polarity: POLARITY.iter().copied().collect(),
            intensifiers: INTENSIFIERS.iter().copied().collect(),
        }
    }

    pub fn polarity(&self, text: &str) -> f64 {
        let mut assessments = Vec::new();
        let mut negated = false;
        let mut intensity = 1.0;

        for token in tokenize(text) {
            if is_negator(&token) {
                negated = true;
                intensity = 1.0;
                continue;
            }
            if let Some(factor) = self.intensifiers.get(token.as_str()) {
                intensity *= factor;
                continue;
            }
            if let Some(&value) = self.polarity.get(token.as_str()) {
                let mut value = value * intensity;
                if negated {
                    value *= -0.5;
                }
                assessments.push(value.clamp(-1.0, 1.0));
                negated = false;
            }
            intensity = 1.0;
        }

        if assessments.is_empty() {
            return 0.0;
        }
        let mean = assessments.iter().sum::<f64>() / assessments.len() as f64;
        mean.clamp(-1.0, 1.0)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace().filter_map(|raw| {
        let token: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '\'' || *c == '’')
            .flat_map(char::to_lowercase)
            .collect::<String>()
            .replace('’', "'");
        let token = token.trim_matches('\'').to_string();
        (!token.is_empty()).then_some(token)
    })
}

fn is_negator(token: &str) -> bool {
    NEGATORS.contains(&token) || token.ends_with("n't")
}

#[async_trait]
impl SentimentScorer for LexiconSentiment {
    async fn score(&self, text: &str) -> Result<f64, ScoringError> {
        Ok(self.polarity(text))
    }
}
