use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, process::Command};
use tracing::{debug, info};

use crate::{
    cache::get_model_dir,
    error::{ReelError, Result, TranscriptionError},
    types::Transcript,
};

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio_path: &Path,
    ) -> std::result::Result<Transcript, TranscriptionError>;
}

/// Make sure the ggml model file is present in the cache, downloading it if needed.
pub async fn ensure_model(root_cache_dir: &Path, model_name: &str) -> Result<PathBuf> {
    let download_url = format!(
        "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}",
        model_name
    );
    let model_dir = get_model_dir(root_cache_dir);

    if !model_dir.exists() {
        fs::create_dir_all(&model_dir).await?;
    }

    let model_path = model_dir.join(model_name);
    if !model_path.exists() {
        info!(model = model_name, "downloading whisper model");
        let partial = model_path.with_extension("part");
        let output = Command::new("curl")
            .arg("-fL")
            .arg(&download_url)
            .arg("-o")
            .arg(&partial)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let _ = fs::remove_file(&partial).await;
            return Err(ReelError::ModelDownloadFailed {
                url: download_url,
                reason: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        fs::rename(&partial, &model_path).await?;
    }

    Ok(model_path)
}

/// Load a transcript from a cached file
pub async fn load_transcript(path: &Path) -> Result<Transcript> {
    let json_content = fs::read_to_string(path).await?;
    let transcript: Transcript = serde_json::from_str(&json_content)?;
    Ok(transcript)
}

pub async fn save_transcript(transcript: &Transcript, path: &Path) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(transcript)?).await?;
    Ok(())
}

/// Runs the `whisper` command line tool and reads back its JSON output.
pub struct WhisperCli {
    model: String,
}

impl WhisperCli {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperCli {
    async fn transcribe(
        &self,
        audio_path: &Path,
    ) -> std::result::Result<Transcript, TranscriptionError> {
        let output_dir = audio_path.parent().unwrap_or(Path::new("."));

        let output = Command::new("whisper")
            .arg(audio_path)
            .arg("--model")
            .arg(&self.model)
            .arg("--output_format")
            .arg("json")
            .arg("--output_dir")
            .arg(output_dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TranscriptionError::Failed {
                reason: format!("failed to run whisper: {e}"),
            })?;

        if !output.status.success() {
            return Err(TranscriptionError::Failed {
                reason: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        // Whisper names output based on input filename
        let stem = audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());
        let whisper_output = output_dir.join(format!("{stem}.json"));
        debug!(path = %whisper_output.display(), "reading whisper output");

        let json_content =
            fs::read_to_string(&whisper_output)
                .await
                .map_err(|e| TranscriptionError::Failed {
                    reason: format!("missing whisper output {}: {e}", whisper_output.display()),
                })?;
        let _ = fs::remove_file(&whisper_output).await;

        parse_whisper_json(&json_content)
    }
}

/// Parse whisper's JSON result (`text`, `segments[]`, `language`).
pub fn parse_whisper_json(json: &str) -> std::result::Result<Transcript, TranscriptionError> {
    #[derive(serde::Deserialize)]
    struct WhisperJson {
        #[serde(default)]
        text: String,
        #[serde(default)]
        segments: Vec<crate::types::TranscriptSegment>,
        #[serde(default)]
        language: Option<String>,
    }

    let parsed: WhisperJson = serde_json::from_str(json).map_err(|e| TranscriptionError::Failed {
        reason: format!("invalid whisper JSON: {e}"),
    })?;

    Ok(Transcript {
        text: parsed.text,
        segments: parsed.segments,
        language: parsed.language.unwrap_or_else(|| "Unknown".to_string()),
    })
}

#[cfg(feature = "local-whisper")]
pub use local::WhisperModel;

#[cfg(feature = "local-whisper")]
mod local {
    use std::path::{Path, PathBuf};

    use async_trait::async_trait;
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    use super::Transcriber;
    use crate::{
        error::TranscriptionError,
        types::{Transcript, TranscriptSegment},
    };

    /// In-process whisper.cpp inference through `whisper-rs`.
    pub struct WhisperModel {
        model_path: PathBuf,
        use_gpu: bool,
    }

    impl WhisperModel {
        pub fn new(model_path: PathBuf) -> Self {
            Self {
                model_path,
                use_gpu: cfg!(feature = "cuda"),
            }
        }

        fn failed(reason: impl std::fmt::Display) -> TranscriptionError {
            TranscriptionError::Failed {
                reason: reason.to_string(),
            }
        }

        fn read_samples(audio_path: &Path) -> Result<Vec<f32>, TranscriptionError> {
            let mut reader = hound::WavReader::open(audio_path).map_err(Self::failed)?;
            reader
                .samples::<i16>()
                .map(|s| s.map(|s| s as f32 / i16::MAX as f32))
                .collect::<Result<Vec<f32>, _>>()
                .map_err(Self::failed)
        }

        fn run(
            model_path: &Path,
            use_gpu: bool,
            samples: &[f32],
        ) -> Result<Transcript, TranscriptionError> {
            let ctx_params = WhisperContextParameters {
                use_gpu,
                flash_attn: use_gpu,
                ..Default::default()
            };
            let model_path_str = model_path
                .to_str()
                .ok_or_else(|| Self::failed("model path is not valid UTF-8"))?;
            let ctx = WhisperContext::new_with_params(model_path_str, ctx_params)
                .map_err(|e| Self::failed(format!("failed to load model: {e}")))?;

            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 5 });
            params.set_language(Some("auto"));
            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);

            let mut state = ctx
                .create_state()
                .map_err(|e| Self::failed(format!("failed to create state: {e}")))?;
            state
                .full(params, samples)
                .map_err(|e| Self::failed(format!("failed to run model: {e}")))?;

            let mut text = String::new();
            let mut segments = Vec::new();

            for segment in state.as_iter() {
                let seg_text = match segment.to_str() {
                    Ok(s) => s,
                    Err(_) => continue,
                };
                segments.push(TranscriptSegment {
                    start: segment.start_timestamp() as f64 / 100.0,
                    end: segment.end_timestamp() as f64 / 100.0,
                    text: seg_text.to_string(),
                });
                text.push_str(seg_text);
            }

            let language_index = state.full_lang_id_from_state();
            let language = whisper_rs::get_lang_str(language_index);

            Ok(Transcript {
                language: language.unwrap_or("Unknown").to_string(),
                segments,
                text,
            })
        }
    }

    #[async_trait]
    impl Transcriber for WhisperModel {
        async fn transcribe(&self, audio_path: &Path) -> Result<Transcript, TranscriptionError> {
            let audio_path = audio_path.to_path_buf();
            let model_path = self.model_path.clone();
            let use_gpu = self.use_gpu;

            tokio::task::spawn_blocking(move || {
                let samples = Self::read_samples(&audio_path)?;
                Self::run(&model_path, use_gpu, &samples)
            })
            .await
            .map_err(|e| Self::failed(format!("transcription task panicked: {e}")))?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whisper_cli_output() {
        let json = r#"{
            "text": " Great news everyone. Terrible day.",
            "segments": [
                {"id": 0, "seek": 0, "start": 0.0, "end": 2.0, "text": " Great news everyone.", "tokens": [1, 2]},
                {"id": 1, "seek": 0, "start": 5.0, "end": 7.0, "text": " Terrible day.", "avg_logprob": -0.2}
            ],
            "language": "en"
        }"#;

        let transcript = parse_whisper_json(json).unwrap();
        assert_eq!(transcript.language, "en");
        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.segments[1].start, 5.0);
        assert_eq!(transcript.segments[1].text, " Terrible day.");
    }

    #[test]
    fn missing_language_is_unknown() {
        let transcript = parse_whisper_json(r#"{"text": "", "segments": []}"#).unwrap();
        assert_eq!(transcript.language, "Unknown");
        assert!(transcript.is_silent());
    }

    #[test]
    fn garbage_is_a_transcription_failure() {
        assert!(matches!(
            parse_whisper_json("not json"),
            Err(TranscriptionError::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn transcript_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.json");
        let transcript = parse_whisper_json(
            r#"{"text": "hi", "segments": [{"start": 0.0, "end": 1.0, "text": "hi"}], "language": "en"}"#,
        )
        .unwrap();

        save_transcript(&transcript, &path).await.unwrap();
        let loaded = load_transcript(&path).await.unwrap();
        assert_eq!(loaded.segments, transcript.segments);
    }
}
