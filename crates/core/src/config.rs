//! Pipeline configuration: defaults, TOML loading and validation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    error::{ReelError, Result},
    provider::Provider,
};

pub const DEFAULT_SEGMENTS_PER_REEL: usize = 5;
pub const DEFAULT_REEL_COUNT: usize = 3;
pub const DEFAULT_BUFFER_SECONDS: f64 = 0.5;
pub const DEFAULT_IMPORTANCE_THRESHOLD: f64 = 1.0;
pub const DEFAULT_MAX_PARALLEL_JOBS: usize = 2;
pub const DEFAULT_WHISPER_MODEL: &str = "ggml-base-q5_1.bin";
pub const DEFAULT_WHISPER_CLI_MODEL: &str = "base";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentSource {
    /// Built-in lexicon estimator, no network.
    #[default]
    Lexicon,
    /// One batched request to the configured chat provider.
    Provider,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranscriberKind {
    #[default]
    WhisperRs,
    WhisperCli,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub segments_per_reel: usize,
    pub reel_count: usize,
    pub buffer_seconds: f64,
    pub importance_threshold: f64,
    /// Re-encode clips instead of stream-copying (frame-accurate cuts, slower).
    pub reencode: bool,
    pub max_parallel_jobs: usize,
    pub sentiment: SentimentSource,
    pub provider: Provider,
    pub transcriber: TranscriberKind,
    /// ggml model file fetched into the cache for the in-process transcriber.
    pub whisper_model: String,
    /// Model name handed to the whisper CLI.
    pub whisper_cli_model: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            segments_per_reel: DEFAULT_SEGMENTS_PER_REEL,
            reel_count: DEFAULT_REEL_COUNT,
            buffer_seconds: DEFAULT_BUFFER_SECONDS,
            importance_threshold: DEFAULT_IMPORTANCE_THRESHOLD,
            reencode: false,
            max_parallel_jobs: DEFAULT_MAX_PARALLEL_JOBS,
            sentiment: SentimentSource::default(),
            provider: Provider::default(),
            transcriber: TranscriberKind::default(),
            whisper_model: DEFAULT_WHISPER_MODEL.to_string(),
            whisper_cli_model: DEFAULT_WHISPER_CLI_MODEL.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.segments_per_reel == 0 {
            return Err(invalid("segments_per_reel must be at least 1"));
        }
        if self.reel_count == 0 {
            return Err(invalid("reel_count must be at least 1"));
        }
        if !self.buffer_seconds.is_finite() || self.buffer_seconds < 0.0 {
            return Err(invalid(format!(
                "buffer_seconds must be a non-negative number, got {}",
                self.buffer_seconds
            )));
        }
        if !self.importance_threshold.is_finite() {
            return Err(invalid(format!(
                "importance_threshold must be finite, got {}",
                self.importance_threshold
            )));
        }
        if self.max_parallel_jobs == 0 {
            return Err(invalid("max_parallel_jobs must be at least 1"));
        }
        if self.whisper_model.trim().is_empty() {
            return Err(invalid("whisper_model must not be empty"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ReelError {
    ReelError::InvalidConfig {
        message: message.into(),
    }
}

/// Load configuration from a TOML file.
///
/// Returns the defaults when the file does not exist.
pub fn load_config_file(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        return Ok(PipelineConfig::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| ReelError::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ReelError::ConfigParse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Platform config location, e.g. `~/.config/reelcut/config.toml`.
pub fn default_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|dir| dir.join("reelcut").join("config.toml"))
}
