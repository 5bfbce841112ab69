use std::{
    hash::{DefaultHasher, Hash, Hasher},
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

pub fn get_root_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("reelcut")
}

/// Get the cache directory for a given video file.
///
/// Keyed by canonical path, size and modification time, so an edited file
/// at the same path gets a fresh directory.
pub fn get_cache_dir(root: &Path, video_path: &Path) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    let canonical = video_path
        .canonicalize()
        .unwrap_or_else(|_| video_path.to_path_buf());
    canonical.hash(&mut hasher);

    if let Ok(meta) = std::fs::metadata(&canonical) {
        meta.len().hash(&mut hasher);
        if let Some(modified) = meta
            .modified()
            .ok()
            .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
        {
            modified.as_nanos().hash(&mut hasher);
        }
    }

    root.join(hasher.finish().to_string())
}

pub fn get_model_dir(root: &Path) -> PathBuf {
    root.join("models")
}

/// Get the path for a cached audio file
pub fn get_audio_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("audio.wav")
}

/// Extraction target, renamed to [`get_audio_path`] once complete.
pub fn get_partial_audio_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("audio.part.wav")
}

/// Get the path for a cached transcript file
pub fn get_transcript_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("transcript.json")
}

/// Scratch directory for one run's intermediate clips.
pub fn get_scratch_dir(cache_dir: &Path, run_id: uuid::Uuid) -> PathBuf {
    cache_dir.join("runs").join(run_id.to_string())
}
