//! Plain-text side channels written next to the reels.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::{
    error::Result,
    format::{format_reel_timestamps, format_scoring_report},
    types::{ReelArtifact, ScoredSegment, Transcript},
};

pub fn reel_path(output_dir: &Path, reel_index: usize, extension: &str) -> PathBuf {
    output_dir.join(format!("reel_{}.{}", reel_index + 1, extension))
}

pub fn timestamps_path(output_dir: &Path, reel_index: usize) -> PathBuf {
    output_dir.join(format!("important_timestamps_reel_{}.txt", reel_index + 1))
}

pub async fn save_reel_timestamps(output_dir: &Path, reel: &ReelArtifact) -> Result<PathBuf> {
    let path = timestamps_path(output_dir, reel.index);
    fs::write(&path, format_reel_timestamps(&reel.segments)).await?;
    Ok(path)
}

pub async fn save_scoring_report(output_dir: &Path, segments: &[ScoredSegment]) -> Result<PathBuf> {
    let path = output_dir.join("important_segments.txt");
    fs::write(&path, format_scoring_report(segments)).await?;
    Ok(path)
}

pub async fn save_transcript_text(output_dir: &Path, transcript: &Transcript) -> Result<PathBuf> {
    let path = output_dir.join("transcript.txt");
    fs::write(&path, transcript.text.trim()).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_one_based() {
        let dir = Path::new("/out");
        assert_eq!(reel_path(dir, 0, "mp4"), Path::new("/out/reel_1.mp4"));
        assert_eq!(
            timestamps_path(dir, 2),
            Path::new("/out/important_timestamps_reel_3.txt")
        );
    }

    #[tokio::test]
    async fn writes_reel_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let reel = ReelArtifact {
            index: 0,
            file_path: dir.path().join("reel_1.mp4"),
            segments: vec![ScoredSegment {
                index: 4,
                text: "great".into(),
                start: 1.0,
                end: 2.0,
                importance_score: 1.5,
                padded_start: 0.5,
                padded_end: 2.5,
            }],
        };

        let path = save_reel_timestamps(dir.path(), &reel).await.unwrap();
        let body = std::fs::read_to_string(path).unwrap();
        assert_eq!(body, "Start: 0.50, End: 2.50\n");
    }
}
