use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use console::style;
use reelcut_core::{
    Ffmpeg, LexiconSentiment, PipelineConfig, Provider, ProviderSentiment, ReelPipeline,
    RunRequest, SentimentScorer, SentimentSource, Transcriber, TranscriberKind, WhisperCli,
    config::default_config_path, format_outcome_readable, get_cache_dir, get_root_cache_dir,
    load_config_file,
};
use tracing::{debug, info, warn};

use crate::progress::{SpinnerProgress, format_duration};

mod progress;

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, Copy, ValueEnum)]
enum CliProvider {
    Grok,
    Openai,
    Gemini,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Grok => Provider::Grok,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Gemini => Provider::Gemini,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliSentiment {
    Lexicon,
    Provider,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliTranscriber {
    WhisperRs,
    WhisperCli,
}

#[derive(Parser)]
#[command(name = "reelcut", version)]
#[command(about = "Cut a long video into short reels built from its most charged moments")]
struct Cli {
    /// Source video file
    video: PathBuf,

    /// Where reels and side files are written
    #[arg(short, long, default_value = "reels")]
    output_dir: PathBuf,

    /// Number of reels to produce
    #[arg(short, long)]
    reels: Option<usize>,

    /// Segments per reel
    #[arg(short, long)]
    segments_per_reel: Option<usize>,

    /// Seconds of context added around each segment
    #[arg(short, long)]
    buffer: Option<f64>,

    /// Minimum importance score a segment must exceed
    #[arg(short, long, allow_negative_numbers = true)]
    threshold: Option<f64>,

    /// Sentiment estimator
    #[arg(long)]
    sentiment: Option<CliSentiment>,

    /// AI provider used when --sentiment=provider
    #[arg(short, long)]
    provider: Option<CliProvider>,

    /// Speech-to-text backend
    #[arg(long)]
    transcriber: Option<CliTranscriber>,

    /// Whisper model (ggml file name for whisper-rs, model name for the CLI)
    #[arg(short, long)]
    model: Option<String>,

    /// Config file (defaults to the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Abort the run after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Maximum concurrent ffmpeg jobs
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Re-encode clips instead of stream-copying
    #[arg(long)]
    reencode: bool,

    /// Force re-processing even if cached files exist
    #[arg(short, long)]
    force: bool,

    /// Print the run outcome as JSON
    #[arg(long)]
    json: bool,

    /// More log output (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    // whisper-rs is noisy at info level
    let filter_str = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info,whisper_rs=warn",
            2 => "debug,whisper_rs=info",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            if !path.exists() {
                bail!("config file not found: {}", path.display());
            }
            load_config_file(path)?
        }
        None => match default_config_path() {
            Some(path) => load_config_file(&path)?,
            None => PipelineConfig::default(),
        },
    };

    if let Some(reels) = cli.reels {
        config.reel_count = reels;
    }
    if let Some(segments) = cli.segments_per_reel {
        config.segments_per_reel = segments;
    }
    if let Some(buffer) = cli.buffer {
        config.buffer_seconds = buffer;
    }
    if let Some(threshold) = cli.threshold {
        config.importance_threshold = threshold;
    }
    if let Some(jobs) = cli.jobs {
        config.max_parallel_jobs = jobs;
    }
    if let Some(provider) = cli.provider {
        config.provider = provider.into();
    }
    if let Some(sentiment) = cli.sentiment {
        config.sentiment = match sentiment {
            CliSentiment::Lexicon => SentimentSource::Lexicon,
            CliSentiment::Provider => SentimentSource::Provider,
        };
    }
    if let Some(transcriber) = cli.transcriber {
        config.transcriber = match transcriber {
            CliTranscriber::WhisperRs => TranscriberKind::WhisperRs,
            CliTranscriber::WhisperCli => TranscriberKind::WhisperCli,
        };
    }
    if let Some(model) = &cli.model {
        match config.transcriber {
            TranscriberKind::WhisperRs => config.whisper_model = model.clone(),
            TranscriberKind::WhisperCli => config.whisper_cli_model = model.clone(),
        }
    }
    config.reencode |= cli.reencode;

    config.validate()?;
    Ok(config)
}

fn build_sentiment(config: &PipelineConfig) -> Result<Arc<dyn SentimentScorer>> {
    Ok(match config.sentiment {
        SentimentSource::Lexicon => Arc::new(LexiconSentiment::new()),
        SentimentSource::Provider => {
            // Validate API key early
            config.provider.validate_api_key()?;
            Arc::new(ProviderSentiment::new(config.provider))
        }
    })
}

async fn build_transcriber(
    config: &PipelineConfig,
    root_cache_dir: &Path,
) -> Result<Arc<dyn Transcriber>> {
    match config.transcriber {
        TranscriberKind::WhisperCli => {
            Ok(Arc::new(WhisperCli::new(config.whisper_cli_model.clone())))
        }
        #[cfg(feature = "local-whisper")]
        TranscriberKind::WhisperRs => {
            let model_path =
                reelcut_core::ensure_model(root_cache_dir, &config.whisper_model).await?;
            Ok(Arc::new(reelcut_core::WhisperModel::new(model_path)))
        }
        #[cfg(not(feature = "local-whisper"))]
        TranscriberKind::WhisperRs => {
            let _ = root_cache_dir;
            bail!("built without the local-whisper feature; use --transcriber whisper-cli")
        }
    }
}

#[cfg(feature = "local-whisper")]
extern "C" fn whisper_log_callback(
    _level: u32,
    _message: *const std::ffi::c_char,
    _user_data: *mut std::ffi::c_void,
) {
    // silent
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    #[cfg(feature = "local-whisper")]
    unsafe {
        whisper_rs::set_log_callback(Some(whisper_log_callback), std::ptr::null_mut());
    }

    if !cli.video.is_file() {
        bail!("video not found: {}", cli.video.display());
    }

    let config = load_config(&cli)?;
    debug!(?config, "resolved configuration");
    let sentiment = build_sentiment(&config)?;

    let root_cache_dir = get_root_cache_dir();
    let cache_dir = get_cache_dir(&root_cache_dir, &cli.video);
    debug!(cache = %cache_dir.display(), "using cache dir");

    let interactive = !cli.json && !cli.quiet;
    if interactive {
        println!(
            "\n{}  {}\n",
            style("reelcut").cyan().bold(),
            style("Video → Reels").dim()
        );
        println!("{} Checking model...", style("✓").green().bold());
    }
    let transcriber = build_transcriber(&config, &root_cache_dir).await?;

    let progress = Arc::new(SpinnerProgress::default());
    let mut pipeline = ReelPipeline::new(
        config.clone(),
        Arc::new(Ffmpeg::new(config.reencode)),
        transcriber,
        sentiment,
    );
    if interactive {
        pipeline = pipeline.with_progress(progress.clone());
        println!("{}", style("─".repeat(60)).dim());
    }

    let request = RunRequest {
        video_path: cli.video.clone(),
        output_dir: cli.output_dir.clone(),
        cache_dir,
        force: cli.force,
        deadline: cli.timeout.map(Duration::from_secs),
    };

    let total_start = Instant::now();
    let outcome = match pipeline.run(&request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            progress.abandon();
            let stage = e.stage();
            return Err(anyhow::Error::new(e).context(format!("{stage} stage failed")));
        }
    };

    info!(
        reels = outcome.reels.len(),
        failures = outcome.failures.len(),
        elapsed = %format_duration(total_start.elapsed()),
        "run complete"
    );

    if cli.json {
        // stdout carries the JSON; lost reels still surface on stderr
        for failure in outcome.failed_reels() {
            warn!(reel = failure.reel_index + 1, kind = ?failure.kind, "{}", failure.reason);
        }
        let json = serde_json::to_string_pretty(&outcome).context("serializing run outcome")?;
        println!("{json}");
    } else {
        if interactive {
            println!(
                "\n{} {}\n",
                style("Total time:").dim(),
                style(format_duration(total_start.elapsed())).cyan().bold()
            );
            println!(
                "{} {}\n",
                style("Saved:").dim(),
                style(request.output_dir.display()).cyan()
            );
            println!("{}", style("─".repeat(60)).dim());
        }
        println!("{}", format_outcome_readable(&outcome));
    }

    if outcome.reels.is_empty() {
        bail!("no reel could be produced");
    }

    Ok(())
}
