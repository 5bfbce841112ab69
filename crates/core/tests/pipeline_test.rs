//! End-to-end runs of the reel pipeline against in-memory media and
//! transcription fakes.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use reelcut_core::{
    FailureKind, MediaToolkit, PipelineConfig, ReelError, ReelPipeline, RunRequest,
    SentimentScorer, Stage, Transcriber, Transcript, TranscriptSegment,
    error::{MediaError, ScoringError, TranscriptionError},
    media::StreamParams,
    pipeline::ProgressSink,
};
use tempfile::TempDir;

#[derive(Default)]
struct FakeMedia {
    fail_audio: bool,
    /// Any cut whose range covers one of these instants fails.
    fail_cuts_at: Vec<f64>,
    /// Clip file names containing this report a different video codec.
    odd_codec_clip: Option<&'static str>,
    /// Any cut whose range covers one of these instants panics.
    panic_cuts_at: Vec<f64>,
    panic_on_stream_params: bool,
    cut_delay: Option<Duration>,
    /// Concat writes part of its output, then stalls this long.
    concat_delay: Option<Duration>,
    audio_calls: AtomicUsize,
}

#[async_trait]
impl MediaToolkit for FakeMedia {
    async fn extract_audio(&self, _video: &Path, audio: &Path) -> Result<(), MediaError> {
        self.audio_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_audio {
            tokio::fs::write(audio, b"RIF").await?;
            return Err(MediaError::ToolFailed {
                tool: "ffmpeg",
                status: "exit status: 1".into(),
                stderr: "no audio stream".into(),
            });
        }
        tokio::fs::write(audio, b"RIFF").await?;
        Ok(())
    }

    async fn probe_duration(&self, _path: &Path) -> Result<f64, MediaError> {
        Ok(200.0)
    }

    async fn stream_params(&self, path: &Path) -> Result<StreamParams, MediaError> {
        assert!(!self.panic_on_stream_params, "ffprobe crashed");
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        let odd = self.odd_codec_clip.is_some_and(|m| name.contains(m));
        Ok(StreamParams {
            video_codec: Some(if odd { "hevc" } else { "h264" }.into()),
            width: Some(1920),
            height: Some(1080),
            audio_codec: Some("aac".into()),
            sample_rate: Some("48000".into()),
        })
    }

    async fn cut_clip(
        &self,
        _source: &Path,
        start: f64,
        end: f64,
        output: &Path,
    ) -> Result<(), MediaError> {
        if let Some(delay) = self.cut_delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_cuts_at.iter().any(|t| start <= *t && *t < end) {
            panic!("cut of {start}..{end} crashed");
        }
        if self.fail_cuts_at.iter().any(|t| start <= *t && *t < end) {
            tokio::fs::write(output, b"partial").await?;
            return Err(MediaError::ToolFailed {
                tool: "ffmpeg",
                status: "exit status: 1".into(),
                stderr: "corrupt packet".into(),
            });
        }
        tokio::fs::write(output, format!("[{start:.2}-{end:.2}]")).await?;
        Ok(())
    }

    async fn concat(&self, clips: &[PathBuf], output: &Path) -> Result<(), MediaError> {
        if let Some(delay) = self.concat_delay {
            tokio::fs::write(output, b"half a reel").await?;
            tokio::time::sleep(delay).await;
        }
        let mut body = String::new();
        for clip in clips {
            body.push_str(&tokio::fs::read_to_string(clip).await?);
        }
        tokio::fs::write(output, body).await?;
        Ok(())
    }
}

struct FakeTranscriber {
    transcript: Transcript,
    calls: AtomicUsize,
}

impl FakeTranscriber {
    fn new(segments: Vec<TranscriptSegment>) -> Self {
        let text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            transcript: Transcript {
                text,
                segments,
                language: "en".into(),
            },
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio: &Path) -> Result<Transcript, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.transcript.clone())
    }
}

/// "great" is fully positive, anything else neutral.
struct KeywordSentiment;

#[async_trait]
impl SentimentScorer for KeywordSentiment {
    async fn score(&self, text: &str) -> Result<f64, ScoringError> {
        Ok(if text.contains("great") { 1.0 } else { 0.0 })
    }
}

#[derive(Default)]
struct RecordingProgress {
    stages: Mutex<Vec<Stage>>,
}

impl ProgressSink for RecordingProgress {
    fn stage(&self, stage: &Stage) {
        self.stages.lock().unwrap().push(stage.clone());
    }
}

/// Segment `i` spans `[10i, 10i + 5)` with `words` repetitions of `word`.
fn segment(i: usize, word: &str, words: usize) -> TranscriptSegment {
    TranscriptSegment {
        start: i as f64 * 10.0,
        end: i as f64 * 10.0 + 5.0,
        text: vec![word; words].join(" "),
    }
}

/// Segments whose importance grows with their index.
fn rising_segments(count: usize) -> Vec<TranscriptSegment> {
    (0..count).map(|i| segment(i, "great", i + 2)).collect()
}

struct Harness {
    dir: TempDir,
    media: Arc<FakeMedia>,
    transcriber: Arc<FakeTranscriber>,
    config: PipelineConfig,
}

impl Harness {
    fn new(media: FakeMedia, segments: Vec<TranscriptSegment>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("talk.mp4"), b"video").unwrap();
        Self {
            dir,
            media: Arc::new(media),
            transcriber: Arc::new(FakeTranscriber::new(segments)),
            config: PipelineConfig {
                segments_per_reel: 3,
                reel_count: 2,
                ..PipelineConfig::default()
            },
        }
    }

    fn pipeline(&self) -> ReelPipeline {
        ReelPipeline::new(
            self.config.clone(),
            self.media.clone(),
            self.transcriber.clone(),
            Arc::new(KeywordSentiment),
        )
    }

    fn request(&self) -> RunRequest {
        RunRequest {
            video_path: self.dir.path().join("talk.mp4"),
            output_dir: self.output_dir(),
            cache_dir: self.dir.path().join("cache"),
            force: false,
            deadline: None,
        }
    }

    fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn leftover_scratch(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("cache").join("runs"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

#[tokio::test]
async fn builds_every_reel_from_the_top_ranked_segments() {
    let harness = Harness::new(FakeMedia::default(), rising_segments(10));
    let progress = Arc::new(RecordingProgress::default());
    let pipeline = harness.pipeline().with_progress(progress.clone());

    let outcome = pipeline.run(&harness.request()).await.unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.reels.len(), 2);
    assert_eq!(outcome.scored_segments.len(), 10);

    let members: Vec<Vec<usize>> = outcome
        .reels
        .iter()
        .map(|r| r.segments.iter().map(|s| s.index).collect())
        .collect();
    assert_eq!(members, vec![vec![7, 8, 9], vec![4, 5, 6]]);

    let out = harness.output_dir();
    let reel = std::fs::read_to_string(out.join("reel_1.mp4")).unwrap();
    assert_eq!(reel, "[69.50-75.50][79.50-85.50][89.50-95.50]");
    assert!(out.join("reel_2.mp4").exists());

    let timestamps = std::fs::read_to_string(out.join("important_timestamps_reel_2.txt")).unwrap();
    assert_eq!(
        timestamps,
        "Start: 39.50, End: 45.50\nStart: 49.50, End: 55.50\nStart: 59.50, End: 65.50\n"
    );
    assert!(out.join("important_segments.txt").exists());
    assert!(out.join("transcript.txt").exists());
    assert_eq!(harness.leftover_scratch(), 0);

    let stages = progress.stages.lock().unwrap();
    assert_eq!(stages.first(), Some(&Stage::Idle));
    assert_eq!(
        stages.last(),
        Some(&Stage::Done {
            reels: 2,
            failures: 0
        })
    );
}

#[tokio::test]
async fn a_failed_segment_is_skipped_and_reported() {
    let media = FakeMedia {
        fail_cuts_at: vec![22.0],
        ..FakeMedia::default()
    };
    let mut harness = Harness::new(media, rising_segments(5));
    harness.config.segments_per_reel = 5;
    harness.config.reel_count = 1;

    let outcome = harness.pipeline().run(&harness.request()).await.unwrap();

    assert_eq!(outcome.reels.len(), 1);
    let kept: Vec<usize> = outcome.reels[0].segments.iter().map(|s| s.index).collect();
    assert_eq!(kept, vec![0, 1, 3, 4]);

    assert_eq!(outcome.failures.len(), 1);
    let failure = &outcome.failures[0];
    assert_eq!(failure.kind, FailureKind::Extraction);
    assert_eq!(failure.reel_index, 0);
    assert_eq!(failure.segment_index, Some(2));
    assert!(failure.reason.contains("corrupt packet"));
}

#[tokio::test]
async fn a_reel_with_no_surviving_clip_is_abandoned() {
    let media = FakeMedia {
        fail_cuts_at: vec![72.0, 82.0, 92.0],
        ..FakeMedia::default()
    };
    let harness = Harness::new(media, rising_segments(10));

    let outcome = harness.pipeline().run(&harness.request()).await.unwrap();

    assert_eq!(outcome.reels.len(), 1);
    assert_eq!(outcome.reels[0].index, 1);
    assert!(!harness.output_dir().join("reel_1.mp4").exists());

    let reel_zero: Vec<FailureKind> = outcome
        .failures
        .iter()
        .filter(|f| f.reel_index == 0)
        .map(|f| f.kind)
        .collect();
    assert_eq!(
        reel_zero,
        vec![
            FailureKind::AllClipsFailed,
            FailureKind::Extraction,
            FailureKind::Extraction,
            FailureKind::Extraction,
        ]
    );
    assert_eq!(outcome.failed_reels().count(), 1);
}

#[tokio::test]
async fn incompatible_clips_fail_only_their_reel() {
    let media = FakeMedia {
        odd_codec_clip: Some("reel0_clip1"),
        ..FakeMedia::default()
    };
    let harness = Harness::new(media, rising_segments(10));

    let outcome = harness.pipeline().run(&harness.request()).await.unwrap();

    assert_eq!(outcome.reels.len(), 1);
    assert_eq!(outcome.reels[0].index, 1);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].kind, FailureKind::Compile);
    assert!(outcome.failures[0].reason.contains("incompatible"));
    assert!(!harness.output_dir().join("reel_1.mp4").exists());
    assert_eq!(harness.leftover_scratch(), 0);
}

#[tokio::test]
async fn audio_failure_aborts_the_run() {
    let media = FakeMedia {
        fail_audio: true,
        ..FakeMedia::default()
    };
    let harness = Harness::new(media, rising_segments(10));

    let err = harness.pipeline().run(&harness.request()).await.unwrap_err();

    assert!(matches!(err, ReelError::AudioExtraction { .. }));
    assert_eq!(harness.transcriber.calls.load(Ordering::SeqCst), 0);
    assert!(!harness.output_dir().join("reel_1.mp4").exists());
}

#[tokio::test]
async fn silent_audio_is_reported_as_no_speech() {
    let silent = vec![TranscriptSegment {
        start: 0.0,
        end: 4.0,
        text: "   ".into(),
    }];
    let harness = Harness::new(FakeMedia::default(), silent);

    let err = harness.pipeline().run(&harness.request()).await.unwrap_err();

    assert!(matches!(
        err,
        ReelError::Transcription {
            source: TranscriptionError::NoSpeech,
            ..
        }
    ));
}

#[tokio::test]
async fn neutral_speech_yields_no_qualifying_segments() {
    let neutral = (0..4).map(|i| segment(i, "fine", 6)).collect();
    let harness = Harness::new(FakeMedia::default(), neutral);

    let err = harness.pipeline().run(&harness.request()).await.unwrap_err();

    assert!(matches!(err, ReelError::NoQualifyingSegments { .. }));
    assert_eq!(err.stage(), "scoring");
}

#[tokio::test]
async fn reels_without_segments_are_reported_as_skipped() {
    let mut harness = Harness::new(FakeMedia::default(), rising_segments(2));
    harness.config.segments_per_reel = 5;
    harness.config.reel_count = 3;

    let outcome = harness.pipeline().run(&harness.request()).await.unwrap();

    assert_eq!(outcome.reels.len(), 1);
    let skipped: Vec<usize> = outcome
        .failures
        .iter()
        .filter(|f| f.kind == FailureKind::SkippedEmpty)
        .map(|f| f.reel_index)
        .collect();
    assert_eq!(skipped, vec![1, 2]);
}

#[tokio::test]
async fn reruns_reuse_the_cache_and_produce_the_same_reels() {
    let harness = Harness::new(FakeMedia::default(), rising_segments(10));
    let pipeline = harness.pipeline();

    let first = pipeline.run(&harness.request()).await.unwrap();
    let second = pipeline.run(&harness.request()).await.unwrap();

    assert_eq!(harness.media.audio_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.transcriber.calls.load(Ordering::SeqCst), 1);

    let plans = |outcome: &reelcut_core::RunOutcome| {
        outcome
            .reels
            .iter()
            .map(|r| (r.index, r.segments.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(plans(&first), plans(&second));

    let forced = RunRequest {
        force: true,
        ..harness.request()
    };
    pipeline.run(&forced).await.unwrap();
    assert_eq!(harness.media.audio_calls.load(Ordering::SeqCst), 2);
    assert_eq!(harness.transcriber.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn deadline_cancels_outstanding_work() {
    let media = FakeMedia {
        cut_delay: Some(Duration::from_secs(30)),
        ..FakeMedia::default()
    };
    let harness = Harness::new(media, rising_segments(10));
    let request = RunRequest {
        deadline: Some(Duration::from_millis(200)),
        ..harness.request()
    };

    let err = harness.pipeline().run(&request).await.unwrap_err();

    assert!(matches!(err, ReelError::Timeout(_)));
    assert_eq!(harness.leftover_scratch(), 0);
    assert!(!harness.output_dir().join("reel_1.mp4").exists());
}

#[tokio::test]
async fn invalid_config_is_rejected_before_any_work() {
    let mut harness = Harness::new(FakeMedia::default(), rising_segments(3));
    harness.config.max_parallel_jobs = 0;

    let err = harness.pipeline().run(&harness.request()).await.unwrap_err();

    assert!(matches!(err, ReelError::InvalidConfig { .. }));
    assert_eq!(harness.media.audio_calls.load(Ordering::SeqCst), 0);
}


#[tokio::test]
async fn failed_audio_extraction_is_not_cached() {
    let media = FakeMedia {
        fail_audio: true,
        ..FakeMedia::default()
    };
    let harness = Harness::new(media, rising_segments(10));

    let err = harness.pipeline().run(&harness.request()).await.unwrap_err();
    assert!(matches!(err, ReelError::AudioExtraction { .. }));
    assert!(!harness.dir.path().join("cache").join("audio.wav").exists());

    let healthy = Arc::new(FakeMedia::default());
    let pipeline = ReelPipeline::new(
        harness.config.clone(),
        healthy.clone(),
        harness.transcriber.clone(),
        Arc::new(KeywordSentiment),
    );
    let outcome = pipeline.run(&harness.request()).await.unwrap();

    assert_eq!(outcome.reels.len(), 2);
    assert_eq!(healthy.audio_calls.load(Ordering::SeqCst), 1);
    let audio = std::fs::read(harness.dir.path().join("cache").join("audio.wav")).unwrap();
    assert_eq!(audio, b"RIFF");
}

#[tokio::test]
async fn a_crashed_clip_task_is_reported_against_its_segment() {
    let media = FakeMedia {
        panic_cuts_at: vec![22.0],
        ..FakeMedia::default()
    };
    let mut harness = Harness::new(media, rising_segments(5));
    harness.config.segments_per_reel = 5;
    harness.config.reel_count = 1;

    let outcome = harness.pipeline().run(&harness.request()).await.unwrap();

    let kept: Vec<usize> = outcome.reels[0].segments.iter().map(|s| s.index).collect();
    assert_eq!(kept, vec![0, 1, 3, 4]);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].kind, FailureKind::Extraction);
    assert_eq!(outcome.failures[0].segment_index, Some(2));
}

#[tokio::test]
async fn a_crashed_reel_task_is_reported_as_aborted() {
    let media = FakeMedia {
        panic_on_stream_params: true,
        ..FakeMedia::default()
    };
    let harness = Harness::new(media, rising_segments(10));

    let outcome = harness.pipeline().run(&harness.request()).await.unwrap();

    assert!(outcome.reels.is_empty());
    let aborted: Vec<(usize, FailureKind)> = outcome
        .failures
        .iter()
        .map(|f| (f.reel_index, f.kind))
        .collect();
    assert_eq!(
        aborted,
        vec![(0, FailureKind::Aborted), (1, FailureKind::Aborted)]
    );
    assert_eq!(harness.leftover_scratch(), 0);
}

#[tokio::test]
async fn deadline_during_concat_leaves_no_partial_reel() {
    let media = FakeMedia {
        concat_delay: Some(Duration::from_secs(30)),
        ..FakeMedia::default()
    };
    let harness = Harness::new(media, rising_segments(10));
    let request = RunRequest {
        deadline: Some(Duration::from_millis(300)),
        ..harness.request()
    };

    let err = harness.pipeline().run(&request).await.unwrap_err();

    assert!(matches!(err, ReelError::Timeout(_)));
    let out = harness.output_dir();
    assert!(!out.join("reel_1.mp4").exists());
    assert!(!out.join("reel_2.mp4").exists());
}
