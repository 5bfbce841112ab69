//! Cutting a reel plan's segments out of the source video.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, warn};

use crate::{
    error::{ExtractionError, MediaError},
    media::MediaToolkit,
    types::{ClipArtifact, ReelPlan, ScoredSegment},
};

/// Container extension for intermediate and output files, taken from the source.
pub fn media_extension(source: &Path) -> String {
    source
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "mp4".to_string())
}

/// Collision-free clip name, unique per reel and playback slot.
pub fn clip_path(
    scratch_dir: &Path,
    reel_index: usize,
    position: usize,
    extension: &str,
) -> PathBuf {
    scratch_dir.join(format!("reel{reel_index}_clip{position}.{extension}"))
}

#[derive(Debug, Default)]
pub struct ExtractedClips {
    /// Successful clips in playback order.
    pub clips: Vec<ClipArtifact>,
    pub failures: Vec<ExtractionError>,
}

/// Cut one segment. A segment whose padded range is empty is rejected here
/// as well, so nothing malformed reaches the media tool.
pub async fn extract_clip(
    toolkit: &dyn MediaToolkit,
    source: &Path,
    segment: &ScoredSegment,
    output: &Path,
) -> Result<(), ExtractionError> {
    let fail = |reason: String| ExtractionError {
        segment_index: segment.index,
        start: segment.padded_start,
        end: segment.padded_end,
        reason,
    };

    if !(segment.padded_end > segment.padded_start) {
        return Err(fail(
            MediaError::InvalidRange {
                start: segment.padded_start,
                end: segment.padded_end,
            }
            .to_string(),
        ));
    }

    toolkit
        .cut_clip(source, segment.padded_start, segment.padded_end, output)
        .await
        .map_err(|e| fail(e.to_string()))
}

/// Cut every segment of `plan` concurrently, each cut holding one permit.
///
/// Failed segments are returned alongside the clips that did succeed; a
/// partially written file of a failed cut is removed.
pub async fn extract_plan(
    toolkit: Arc<dyn MediaToolkit>,
    source: &Path,
    plan: &ReelPlan,
    scratch_dir: &Path,
    permits: Arc<Semaphore>,
) -> ExtractedClips {
    let extension = media_extension(source);
    let outputs: Vec<PathBuf> = (0..plan.segments.len())
        .map(|position| clip_path(scratch_dir, plan.index, position, &extension))
        .collect();
    let mut tasks = JoinSet::new();

    for (position, segment) in plan.segments.iter().enumerate() {
        let toolkit = Arc::clone(&toolkit);
        let permits = Arc::clone(&permits);
        let source = source.to_path_buf();
        let segment = segment.clone();
        let output = outputs[position].clone();

        tasks.spawn(async move {
            let result = match permits.acquire_owned().await {
                Ok(_permit) => extract_clip(toolkit.as_ref(), &source, &segment, &output).await,
                Err(_) => Err(ExtractionError {
                    segment_index: segment.index,
                    start: segment.padded_start,
                    end: segment.padded_end,
                    reason: "worker pool closed".to_string(),
                }),
            };
            (position, result)
        });
    }

    let mut done: Vec<Option<Result<(), ExtractionError>>> =
        plan.segments.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((position, result)) => done[position] = Some(result),
            Err(e) => warn!(reel = plan.index, "clip task aborted: {e}"),
        }
    }

    let mut extracted = ExtractedClips::default();
    let slots = plan.segments.iter().zip(outputs).zip(done);
    for (position, ((segment, output), result)) in slots.enumerate() {
        // No result means the task panicked before reporting back.
        let result = result.unwrap_or_else(|| {
            Err(ExtractionError {
                segment_index: segment.index,
                start: segment.padded_start,
                end: segment.padded_end,
                reason: "clip task aborted".to_string(),
            })
        });
        match result {
            Ok(()) => {
                debug!(reel = plan.index, position, path = %output.display(), "clip extracted");
                extracted.clips.push(ClipArtifact {
                    source_segment: segment.clone(),
                    position,
                    file_path: output,
                });
            }
            Err(e) => {
                warn!(reel = plan.index, "{e}");
                let _ = tokio::fs::remove_file(&output).await;
                extracted.failures.push(e);
            }
        }
    }

    extracted
}
