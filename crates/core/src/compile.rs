//! Joining a reel's clips into one video.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::{error::CompileError, media::MediaToolkit, types::ClipArtifact};

/// Concatenate `clips` (already in playback order) into `output`.
///
/// All clips must share codec parameters; there is no transcoding fallback.
/// The clip files are deleted before returning, whatever the outcome.
pub async fn compile_reel(
    toolkit: &dyn MediaToolkit,
    reel_index: usize,
    clips: &[ClipArtifact],
    output: &Path,
) -> Result<PathBuf, CompileError> {
    let result = concat_checked(toolkit, reel_index, clips, output).await;
    remove_clips(clips).await;

    if result.is_err() {
        let _ = fs::remove_file(output).await;
    }
    result.map(|()| output.to_path_buf())
}

async fn concat_checked(
    toolkit: &dyn MediaToolkit,
    reel_index: usize,
    clips: &[ClipArtifact],
    output: &Path,
) -> Result<(), CompileError> {
    let fail = |reason: String| CompileError { reel_index, reason };

    if clips.is_empty() {
        return Err(fail("no clips to compile".to_string()));
    }

    let mut reference = None;
    for clip in clips {
        let params = toolkit
            .stream_params(&clip.file_path)
            .await
            .map_err(|e| fail(format!("cannot probe {}: {e}", clip.file_path.display())))?;

        match &reference {
            None => reference = Some(params),
            Some(expected) if *expected != params => {
                return Err(fail(format!(
                    "clip {} has incompatible streams ({params:?} vs {expected:?})",
                    clip.file_path.display()
                )));
            }
            Some(_) => {}
        }
    }

    let paths: Vec<PathBuf> = clips.iter().map(|c| c.file_path.clone()).collect();
    toolkit
        .concat(&paths, output)
        .await
        .map_err(|e| fail(e.to_string()))?;

    match fs::metadata(output).await {
        Ok(meta) if meta.len() > 0 => {
            debug!(
                reel = reel_index,
                path = %output.display(),
                bytes = meta.len(),
                "reel compiled"
            );
            Ok(())
        }
        _ => Err(fail(format!("{} is missing or empty", output.display()))),
    }
}

async fn remove_clips(clips: &[ClipArtifact]) {
    for clip in clips {
        if let Err(e) = fs::remove_file(&clip.file_path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %clip.file_path.display(), "failed to remove clip: {e}");
        }
    }
}
