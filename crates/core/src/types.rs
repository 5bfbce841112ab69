use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
    pub language: String,
}

impl Transcript {
    /// True when nothing but whitespace was recognized.
    pub fn is_silent(&self) -> bool {
        self.text.trim().is_empty() && self.segments.iter().all(|s| s.text.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl TranscriptSegment {
    /// A segment is usable only with finite bounds and a positive duration.
    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start < self.end
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSegment {
    /// Position of the segment in the transcript; doubles as its identity.
    pub index: usize,
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub importance_score: f64,
    pub padded_start: f64,
    pub padded_end: f64,
}

impl ScoredSegment {
    pub fn padded_duration(&self) -> f64 {
        self.padded_end - self.padded_start
    }
}

/// Segments assigned to one reel, in playback order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReelPlan {
    pub index: usize,
    pub segments: Vec<ScoredSegment>,
}

/// One extracted clip; `position` is its playback slot inside the reel.
#[derive(Debug, Clone)]
pub struct ClipArtifact {
    pub source_segment: ScoredSegment,
    pub position: usize,
    pub file_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReelArtifact {
    pub index: usize,
    pub file_path: PathBuf,
    pub segments: Vec<ScoredSegment>,
}

impl ReelArtifact {
    pub fn duration(&self) -> f64 {
        self.segments.iter().map(ScoredSegment::padded_duration).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// One segment could not be cut; the reel went on without it.
    Extraction,
    /// Every segment of the reel failed to cut.
    AllClipsFailed,
    /// Concatenation of the reel's clips failed.
    Compile,
    /// Not enough qualifying segments were left for this reel.
    SkippedEmpty,
    /// The reel's worker task panicked or was cancelled.
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFailure {
    pub reel_index: usize,
    pub segment_index: Option<usize>,
    pub kind: FailureKind,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub reels: Vec<ReelArtifact>,
    pub failures: Vec<RunFailure>,
    pub scored_segments: Vec<ScoredSegment>,
}

impl RunOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures that cost a whole reel rather than a single segment.
    pub fn failed_reels(&self) -> impl Iterator<Item = &RunFailure> {
        self.failures
            .iter()
            .filter(|f| f.kind != FailureKind::Extraction)
    }
}
