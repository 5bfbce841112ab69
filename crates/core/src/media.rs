//! ffmpeg / ffprobe invocations.
//!
//! Everything the pipeline needs from the media tool goes through the
//! [`MediaToolkit`] trait so the orchestrator can run against fakes in tests.

use std::{
    path::{Path, PathBuf},
    process::{Output, Stdio},
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::{fs, process::Command};
use tracing::debug;

use crate::error::MediaError;

/// Stream parameters that must match for a lossless concat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamParams {
    pub video_codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub audio_codec: Option<String>,
    pub sample_rate: Option<String>,
}

#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Write a mono 16 kHz PCM wav of the video's audio track.
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<(), MediaError>;

    /// Container duration in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError>;

    async fn stream_params(&self, path: &Path) -> Result<StreamParams, MediaError>;

    /// Cut `[start, end)` of `source` into `output`.
    async fn cut_clip(
        &self,
        source: &Path,
        start: f64,
        end: f64,
        output: &Path,
    ) -> Result<(), MediaError>;

    /// Join `clips` in the given order into `output` without re-encoding.
    async fn concat(&self, clips: &[PathBuf], output: &Path) -> Result<(), MediaError>;
}

/// [`MediaToolkit`] backed by the `ffmpeg` and `ffprobe` binaries on PATH.
#[derive(Debug, Clone, Default)]
pub struct Ffmpeg {
    reencode: bool,
}

impl Ffmpeg {
    pub fn new(reencode: bool) -> Self {
        Self { reencode }
    }

    async fn run(tool: &'static str, command: &mut Command) -> Result<Output, MediaError> {
        debug!(tool, command = ?command.as_std(), "running media tool");

        // Dropping the future (deadline hit) kills the child.
        let output = command
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::ToolFailed {
                tool,
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        Ok(output)
    }

    async fn probe(&self, path: &Path) -> Result<FfprobeOutput, MediaError> {
        ensure_readable(path).await?;

        let output = Self::run(
            "ffprobe",
            Command::new("ffprobe")
                .args([
                    "-v",
                    "quiet",
                    "-print_format",
                    "json",
                    "-show_format",
                    "-show_streams",
                ])
                .arg(path),
        )
        .await?;

        serde_json::from_slice(&output.stdout).map_err(|e| MediaError::BadOutput {
            tool: "ffprobe",
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    sample_rate: Option<String>,
}

impl FfprobeOutput {
    fn stream(&self, codec_type: &str) -> Option<&FfprobeStream> {
        self.streams.iter().find(|s| s.codec_type == codec_type)
    }

    fn params(&self) -> StreamParams {
        let video = self.stream("video");
        let audio = self.stream("audio");
        StreamParams {
            video_codec: video.and_then(|s| s.codec_name.clone()),
            width: video.and_then(|s| s.width),
            height: video.and_then(|s| s.height),
            audio_codec: audio.and_then(|s| s.codec_name.clone()),
            sample_rate: audio.and_then(|s| s.sample_rate.clone()),
        }
    }
}

#[async_trait]
impl MediaToolkit for Ffmpeg {
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<(), MediaError> {
        ensure_readable(video_path).await?;

        Self::run(
            "ffmpeg",
            Command::new("ffmpeg")
                .arg("-y")
                .arg("-i")
                .arg(video_path)
                .arg("-vn")
                .arg("-acodec")
                .arg("pcm_s16le")
                .arg("-ar")
                .arg("16000")
                .arg("-ac")
                .arg("1")
                .arg(audio_path),
        )
        .await?;

        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError> {
        let probe = self.probe(path).await?;
        probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or_else(|| MediaError::BadOutput {
                tool: "ffprobe",
                reason: format!("no usable duration for {}", path.display()),
            })
    }

    async fn stream_params(&self, path: &Path) -> Result<StreamParams, MediaError> {
        Ok(self.probe(path).await?.params())
    }

    async fn cut_clip(
        &self,
        source: &Path,
        start: f64,
        end: f64,
        output: &Path,
    ) -> Result<(), MediaError> {
        if !(start.is_finite() && end.is_finite()) || end <= start {
            return Err(MediaError::InvalidRange { start, end });
        }
        ensure_readable(source).await?;

        let mut command = Command::new("ffmpeg");
        command
            .args(["-y", "-v", "error"])
            .arg("-ss")
            .arg(format!("{start:.3}"))
            .arg("-i")
            .arg(source)
            .arg("-t")
            .arg(format!("{:.3}", end - start));

        if self.reencode {
            command.args([
                "-c:v", "libx264", "-preset", "veryfast", "-crf", "20", "-c:a", "aac", "-b:a",
                "128k",
            ]);
        } else {
            // Stream copy snaps the cut to the nearest keyframe.
            command.args(["-c", "copy", "-avoid_negative_ts", "make_zero"]);
        }

        Self::run("ffmpeg", command.arg(output)).await?;
        Ok(())
    }

    async fn concat(&self, clips: &[PathBuf], output: &Path) -> Result<(), MediaError> {
        let list_path = concat_list_path(output);
        fs::write(&list_path, concat_list(clips)).await?;

        let result = Self::run(
            "ffmpeg",
            Command::new("ffmpeg")
                .args(["-y", "-v", "error", "-f", "concat", "-safe", "0", "-i"])
                .arg(&list_path)
                .args(["-c", "copy"])
                .arg(output),
        )
        .await;

        let _ = fs::remove_file(&list_path).await;
        result.map(|_| ())
    }
}

/// Demuxer list written next to a concat output while ffmpeg runs.
pub fn concat_list_path(output: &Path) -> PathBuf {
    output.with_extension("concat.txt")
}

/// Body of an ffmpeg concat demuxer list.
pub fn concat_list(clips: &[PathBuf]) -> String {
    clips
        .iter()
        .map(|clip| {
            let path = clip.to_string_lossy().replace('\'', r"'\''");
            format!("file '{}'\n", path)
        })
        .collect()
}

async fn ensure_readable(path: &Path) -> Result<(), MediaError> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(MediaError::Unreadable {
            path: path.to_path_buf(),
        }),
    }
}

/// Last few lines of a tool's stderr; ffmpeg puts the actual error at the end.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(5);
    lines[start..].join("\n")
}
