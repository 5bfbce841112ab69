pub mod cache;
pub mod clip;
pub mod compile;
pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod media;
pub mod pipeline;
pub mod provider;
pub mod scorer;
pub mod selector;
pub mod sentiment;
pub mod transcribe;
pub mod types;

pub use cache::{
    get_audio_path, get_cache_dir, get_model_dir, get_root_cache_dir, get_transcript_path,
};
pub use config::{PipelineConfig, SentimentSource, TranscriberKind, load_config_file};
pub use error::{ReelError, Result};
pub use format::{format_outcome_readable, format_timestamp};
pub use media::{Ffmpeg, MediaToolkit};
pub use pipeline::{ProgressSink, ReelPipeline, ReelState, RunRequest, Stage};
pub use provider::{Provider, ProviderConfig};
pub use sentiment::{LexiconSentiment, ProviderSentiment, SentimentScorer};
pub use transcribe::{Transcriber, WhisperCli, ensure_model};
#[cfg(feature = "local-whisper")]
pub use transcribe::WhisperModel;
pub use types::{
    FailureKind, ReelArtifact, ReelPlan, RunFailure, RunOutcome, ScoredSegment, Transcript,
    TranscriptSegment,
};
