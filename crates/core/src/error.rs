use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::provider::ProviderError;

/// Run-level failures. Any of these aborts the whole run.
#[derive(Error, Debug)]
pub enum ReelError {
    #[error("Audio extraction failed for {video_path}: {reason}")]
    AudioExtraction { video_path: PathBuf, reason: String },

    #[error("Transcription failed for {audio_path}: {source}")]
    Transcription {
        audio_path: PathBuf,
        #[source]
        source: TranscriptionError,
    },

    #[error("Sentiment scoring failed: {0}")]
    Scoring(#[from] ScoringError),

    #[error("No transcript segment scored above the importance threshold {threshold}")]
    NoQualifyingSegments { threshold: f64 },

    #[error("Run exceeded its deadline of {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Model download failed for {url}: {reason}")]
    ModelDownloadFailed { url: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ReelError {
    /// Short name of the pipeline stage the error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            ReelError::AudioExtraction { .. } => "audio",
            ReelError::Transcription { .. } => "transcription",
            ReelError::Scoring(_) | ReelError::NoQualifyingSegments { .. } => "scoring",
            ReelError::Timeout(_) => "deadline",
            ReelError::InvalidConfig { .. }
            | ReelError::ConfigRead { .. }
            | ReelError::ConfigParse { .. } => "config",
            ReelError::ModelDownloadFailed { .. } => "model",
            ReelError::IoError(_) | ReelError::JsonError(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, ReelError>;

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("{reason}")]
    Failed { reason: String },

    /// The audio holds only music or silence.
    #[error("the audio contains no recognizable speech, only music or silence")]
    NoSpeech,
}

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),

    #[error("Invalid API response: {0}")]
    InvalidApiResponse(String),

    #[error("Expected {expected} polarities, provider returned {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Failures of a single ffmpeg/ffprobe invocation.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        status: String,
        stderr: String,
    },

    #[error("Source file is not readable: {path}")]
    Unreadable { path: PathBuf },

    #[error("Invalid time range {start:.3}s..{end:.3}s")]
    InvalidRange { start: f64, end: f64 },

    #[error("Unexpected {tool} output: {reason}")]
    BadOutput { tool: &'static str, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A single segment could not be cut out of the source.
#[derive(Error, Debug)]
#[error("Clip extraction failed for segment {segment_index} ({start:.2}s..{end:.2}s): {reason}")]
pub struct ExtractionError {
    pub segment_index: usize,
    pub start: f64,
    pub end: f64,
    pub reason: String,
}

/// A reel could not be assembled from its clips.
#[derive(Error, Debug)]
#[error("Reel {reel_index} compilation failed: {reason}")]
pub struct CompileError {
    pub reel_index: usize,
    pub reason: String,
}
