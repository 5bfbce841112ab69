//! Importance scoring: `polarity * word_count`, plus time padding.

use tracing::{debug, warn};

use crate::{
    error::ScoringError,
    sentiment::SentimentScorer,
    types::{ScoredSegment, TranscriptSegment},
};

#[derive(Debug, Clone, Copy)]
pub struct ScoringParams {
    pub buffer_seconds: f64,
    /// Segments must score strictly above this to be kept.
    pub threshold: f64,
    /// Source duration used to clamp the padded end, when known.
    pub source_duration: Option<f64>,
}

/// Extend `[start, end]` by `buffer` on both sides, clamped to `[0, duration]`.
pub fn pad_bounds(start: f64, end: f64, buffer: f64, duration: Option<f64>) -> (f64, f64) {
    let padded_start = (start - buffer).max(0.0);
    let padded_end = match duration {
        Some(duration) => (end + buffer).min(duration),
        None => end + buffer,
    };
    (padded_start, padded_end)
}

pub fn importance(polarity: f64, word_count: usize) -> f64 {
    polarity.clamp(-1.0, 1.0) * word_count as f64
}

/// Score every usable segment and keep the ones above the threshold.
///
/// Output is in transcript order. Segments with a non-positive duration,
/// blank text, or padded bounds that collapse after clamping are skipped.
pub async fn score_segments(
    segments: &[TranscriptSegment],
    scorer: &dyn SentimentScorer,
    params: &ScoringParams,
) -> Result<Vec<ScoredSegment>, ScoringError> {
    let mut candidates = Vec::with_capacity(segments.len());
    for (index, segment) in segments.iter().enumerate() {
        if !segment.is_valid() {
            warn!(
                index,
                start = segment.start,
                end = segment.end,
                "skipping transcript segment with non-positive duration"
            );
            continue;
        }
        if segment.text.trim().is_empty() {
            continue;
        }
        candidates.push((index, segment));
    }

    let texts: Vec<String> = candidates.iter().map(|(_, s)| s.text.clone()).collect();
    let polarities = scorer.score_batch(&texts).await?;
    if polarities.len() != candidates.len() {
        return Err(ScoringError::CountMismatch {
            expected: candidates.len(),
            actual: polarities.len(),
        });
    }

    let mut kept = Vec::new();
    for ((index, segment), polarity) in candidates.into_iter().zip(polarities) {
        let importance_score = importance(polarity, segment.word_count());
        if importance_score <= params.threshold {
            continue;
        }

        let (padded_start, padded_end) = pad_bounds(
            segment.start,
            segment.end,
            params.buffer_seconds,
            params.source_duration,
        );
        if padded_end <= padded_start {
            warn!(index, "segment lies outside the source duration, skipping");
            continue;
        }

        debug!(index, importance_score, "segment kept");
        kept.push(ScoredSegment {
            index,
            text: segment.text.clone(),
            start: segment.start,
            end: segment.end,
            importance_score,
            padded_start,
            padded_end,
        });
    }

    Ok(kept)
}
