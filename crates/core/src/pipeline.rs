//! Run orchestration: audio → transcript → scores → plans → reels.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tokio::{fs, sync::Semaphore, task::JoinSet};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    cache::{get_audio_path, get_partial_audio_path, get_scratch_dir, get_transcript_path},
    clip::{extract_plan, media_extension},
    compile::compile_reel,
    config::PipelineConfig,
    error::{CompileError, ReelError, Result, TranscriptionError},
    export::{reel_path, save_reel_timestamps, save_scoring_report, save_transcript_text},
    media::{MediaToolkit, concat_list_path},
    scorer::{ScoringParams, score_segments},
    selector::plan_reels,
    sentiment::SentimentScorer,
    transcribe::{Transcriber, load_transcript, save_transcript},
    types::{
        FailureKind, ReelArtifact, ReelPlan, RunFailure, RunOutcome, ScoredSegment, Transcript,
    },
};

/// Run-level states, reported as they are reached.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Idle,
    AudioExtracted { cached: bool },
    Transcribed { cached: bool, segments: usize, language: String },
    Scored { kept: usize },
    Planned { reels: usize, empty: usize },
    Done { reels: usize, failures: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReelState {
    Extracting,
    Compiling,
    Compiled,
    SkippedEmpty,
    Failed,
}

/// Observer for run progress. Called from worker tasks, hence `Sync`.
pub trait ProgressSink: Send + Sync {
    fn stage(&self, _stage: &Stage) {}
    fn reel(&self, _reel_index: usize, _state: ReelState) {}
}

pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Everything one run needs to know about its caller.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub video_path: PathBuf,
    pub output_dir: PathBuf,
    /// Per-video cache holding audio and transcript between runs.
    pub cache_dir: PathBuf,
    /// Ignore cached audio and transcript.
    pub force: bool,
    pub deadline: Option<Duration>,
}

pub struct ReelPipeline {
    config: PipelineConfig,
    toolkit: Arc<dyn MediaToolkit>,
    transcriber: Arc<dyn Transcriber>,
    sentiment: Arc<dyn SentimentScorer>,
    progress: Arc<dyn ProgressSink>,
}

struct ReelResult {
    index: usize,
    artifact: Option<ReelArtifact>,
    failures: Vec<RunFailure>,
}

impl ReelPipeline {
    pub fn new(
        config: PipelineConfig,
        toolkit: Arc<dyn MediaToolkit>,
        transcriber: Arc<dyn Transcriber>,
        sentiment: Arc<dyn SentimentScorer>,
    ) -> Self {
        Self {
            config,
            toolkit,
            transcriber,
            sentiment,
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub async fn run(&self, request: &RunRequest) -> Result<RunOutcome> {
        self.config.validate()?;

        let run_id = Uuid::new_v4();
        let scratch_dir = get_scratch_dir(&request.cache_dir, run_id);
        info!(%run_id, video = %request.video_path.display(), "starting run");

        let stages = self.run_stages(request, &scratch_dir);
        let result = match request.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, stages).await {
                Ok(result) => result,
                Err(_) => {
                    // Killed tools never reach their own cleanup.
                    self.remove_reel_outputs(request).await;
                    Err(ReelError::Timeout(deadline))
                }
            },
            None => stages.await,
        };

        if let Err(e) = fs::remove_dir_all(&scratch_dir).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %scratch_dir.display(), "failed to remove scratch dir: {e}");
        }

        result
    }

    async fn remove_reel_outputs(&self, request: &RunRequest) {
        let extension = media_extension(&request.video_path);
        for index in 0..self.config.reel_count {
            let output = reel_path(&request.output_dir, index, &extension);
            remove_if_present(&output).await;
            remove_if_present(&concat_list_path(&output)).await;
        }
    }

    async fn run_stages(&self, request: &RunRequest, scratch_dir: &Path) -> Result<RunOutcome> {
        self.progress.stage(&Stage::Idle);
        fs::create_dir_all(&request.cache_dir).await?;
        fs::create_dir_all(&request.output_dir).await?;
        fs::create_dir_all(scratch_dir).await?;

        let audio_path = self.extract_audio(request).await?;
        let source_duration = match self.toolkit.probe_duration(&request.video_path).await {
            Ok(duration) => Some(duration),
            Err(e) => {
                warn!("could not probe source duration, padded ends stay unclamped: {e}");
                None
            }
        };

        let transcript = self.transcribe(request, &audio_path).await?;
        if let Err(e) = save_transcript_text(&request.output_dir, &transcript).await {
            warn!("failed to write transcript text: {e}");
        }

        let scored = self.score(&transcript, source_duration).await?;
        if let Err(e) = save_scoring_report(&request.output_dir, &scored).await {
            warn!("failed to write scoring report: {e}");
        }

        let selection = plan_reels(
            &scored,
            self.config.segments_per_reel,
            self.config.reel_count,
        );
        self.progress.stage(&Stage::Planned {
            reels: selection.plans.len(),
            empty: selection.empty_reels.len(),
        });

        let mut failures = Vec::new();
        for &index in &selection.empty_reels {
            warn!(reel = index, "not enough qualifying segments, reel skipped");
            self.progress.reel(index, ReelState::SkippedEmpty);
            failures.push(RunFailure {
                reel_index: index,
                segment_index: None,
                kind: FailureKind::SkippedEmpty,
                reason: "not enough qualifying segments for this reel".to_string(),
            });
        }

        let mut results = self
            .assemble_reels(request, scratch_dir, selection.plans)
            .await;
        results.sort_by_key(|r| r.index);

        let mut reels = Vec::new();
        for result in results {
            failures.extend(result.failures);
            if let Some(reel) = result.artifact {
                if let Err(e) = save_reel_timestamps(&request.output_dir, &reel).await {
                    warn!(reel = reel.index, "failed to write timestamps: {e}");
                }
                reels.push(reel);
            }
        }
        failures.sort_by_key(|f| (f.reel_index, f.segment_index));

        self.progress.stage(&Stage::Done {
            reels: reels.len(),
            failures: failures.len(),
        });
        info!(reels = reels.len(), failures = failures.len(), "run finished");

        Ok(RunOutcome {
            reels,
            failures,
            scored_segments: scored,
        })
    }

    async fn extract_audio(&self, request: &RunRequest) -> Result<PathBuf> {
        let audio_path = get_audio_path(&request.cache_dir);
        let cached = !request.force && audio_path.exists();

        if !cached {
            // Only a finished extraction may land on the cached path.
            let partial = get_partial_audio_path(&request.cache_dir);
            if let Err(e) = self
                .toolkit
                .extract_audio(&request.video_path, &partial)
                .await
            {
                let _ = fs::remove_file(&partial).await;
                return Err(ReelError::AudioExtraction {
                    video_path: request.video_path.clone(),
                    reason: e.to_string(),
                });
            }
            fs::rename(&partial, &audio_path).await?;
        }

        self.progress.stage(&Stage::AudioExtracted { cached });
        Ok(audio_path)
    }

    async fn transcribe(&self, request: &RunRequest, audio_path: &Path) -> Result<Transcript> {
        let transcript_path = get_transcript_path(&request.cache_dir);

        let mut cached = None;
        if !request.force && transcript_path.exists() {
            match load_transcript(&transcript_path).await {
                Ok(transcript) => cached = Some(transcript),
                Err(e) => warn!("ignoring unreadable cached transcript: {e}"),
            }
        }

        let from_cache = cached.is_some();
        let transcript = match cached {
            Some(transcript) => transcript,
            None => {
                let transcript = self
                    .transcriber
                    .transcribe(audio_path)
                    .await
                    .map_err(|source| ReelError::Transcription {
                        audio_path: audio_path.to_path_buf(),
                        source,
                    })?;
                save_transcript(&transcript, &transcript_path).await?;
                transcript
            }
        };

        let has_speech = transcript
            .segments
            .iter()
            .any(|s| s.is_valid() && !s.text.trim().is_empty());
        if transcript.is_silent() || !has_speech {
            return Err(ReelError::Transcription {
                audio_path: audio_path.to_path_buf(),
                source: TranscriptionError::NoSpeech,
            });
        }

        self.progress.stage(&Stage::Transcribed {
            cached: from_cache,
            segments: transcript.segments.len(),
            language: transcript.language.clone(),
        });
        Ok(transcript)
    }

    async fn score(
        &self,
        transcript: &Transcript,
        source_duration: Option<f64>,
    ) -> Result<Vec<ScoredSegment>> {
        let params = ScoringParams {
            buffer_seconds: self.config.buffer_seconds,
            threshold: self.config.importance_threshold,
            source_duration,
        };
        let scored = score_segments(&transcript.segments, self.sentiment.as_ref(), &params).await?;

        if scored.is_empty() {
            return Err(ReelError::NoQualifyingSegments {
                threshold: self.config.importance_threshold,
            });
        }

        self.progress.stage(&Stage::Scored { kept: scored.len() });
        Ok(scored)
    }

    async fn assemble_reels(
        &self,
        request: &RunRequest,
        scratch_dir: &Path,
        plans: Vec<ReelPlan>,
    ) -> Vec<ReelResult> {
        let permits = Arc::new(Semaphore::new(self.config.max_parallel_jobs));
        let extension = media_extension(&request.video_path);
        let mut tasks = JoinSet::new();
        let mut pending = Vec::with_capacity(plans.len());

        for plan in plans {
            let toolkit = Arc::clone(&self.toolkit);
            let progress = Arc::clone(&self.progress);
            let permits = Arc::clone(&permits);
            let source = request.video_path.clone();
            let scratch_dir = scratch_dir.to_path_buf();
            let output = reel_path(&request.output_dir, plan.index, &extension);
            pending.push((plan.index, output.clone()));

            tasks.spawn(async move {
                let (source, scratch_dir) = (source.as_path(), scratch_dir.as_path());
                assemble_reel(toolkit, progress, permits, source, scratch_dir, plan, &output).await
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => warn!("reel task aborted: {e}"),
            }
        }

        // A panicked task takes its result with it; any reel missing here aborted.
        for (index, output) in pending {
            if results.iter().any(|r| r.index == index) {
                continue;
            }
            remove_if_present(&output).await;
            self.progress.reel(index, ReelState::Failed);
            results.push(ReelResult {
                index,
                artifact: None,
                failures: vec![RunFailure {
                    reel_index: index,
                    segment_index: None,
                    kind: FailureKind::Aborted,
                    reason: "reel task aborted before reporting a result".to_string(),
                }],
            });
        }
        results
    }
}

async fn remove_if_present(path: &Path) {
    if let Err(e) = fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), "failed to remove partial output: {e}");
    }
}

async fn assemble_reel(
    toolkit: Arc<dyn MediaToolkit>,
    progress: Arc<dyn ProgressSink>,
    permits: Arc<Semaphore>,
    source: &Path,
    scratch_dir: &Path,
    plan: ReelPlan,
    output: &Path,
) -> ReelResult {
    let index = plan.index;
    progress.reel(index, ReelState::Extracting);

    let extracted = extract_plan(
        Arc::clone(&toolkit),
        source,
        &plan,
        scratch_dir,
        Arc::clone(&permits),
    )
    .await;

    let mut failures: Vec<RunFailure> = extracted
        .failures
        .iter()
        .map(|e| RunFailure {
            reel_index: index,
            segment_index: Some(e.segment_index),
            kind: FailureKind::Extraction,
            reason: e.to_string(),
        })
        .collect();

    if extracted.clips.is_empty() {
        warn!(reel = index, "every clip failed, reel abandoned");
        progress.reel(index, ReelState::Failed);
        failures.push(RunFailure {
            reel_index: index,
            segment_index: None,
            kind: FailureKind::AllClipsFailed,
            reason: format!("all {} segments failed extraction", plan.segments.len()),
        });
        return ReelResult {
            index,
            artifact: None,
            failures,
        };
    }

    progress.reel(index, ReelState::Compiling);
    let compiled = match permits.acquire_owned().await {
        Ok(_permit) => compile_reel(toolkit.as_ref(), index, &extracted.clips, output).await,
        Err(_) => Err(CompileError {
            reel_index: index,
            reason: "worker pool closed".to_string(),
        }),
    };

    match compiled {
        Ok(file_path) => {
            info!(
                reel = index,
                path = %file_path.display(),
                clips = extracted.clips.len(),
                "reel compiled"
            );
            progress.reel(index, ReelState::Compiled);
            ReelResult {
                index,
                artifact: Some(ReelArtifact {
                    index,
                    file_path,
                    segments: extracted
                        .clips
                        .into_iter()
                        .map(|clip| clip.source_segment)
                        .collect(),
                }),
                failures,
            }
        }
        Err(e) => {
            warn!(reel = index, "{e}");
            progress.reel(index, ReelState::Failed);
            failures.push(RunFailure {
                reel_index: index,
                segment_index: None,
                kind: FailureKind::Compile,
                reason: e.to_string(),
            });
            ReelResult {
                index,
                artifact: None,
                failures,
            }
        }
    }
}
