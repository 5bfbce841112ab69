use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use reelcut_core::{ProgressSink, ReelState, Stage};

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

struct Step {
    spinner: ProgressBar,
    started: Instant,
}

/// Terminal progress: one spinner per stage, finished with a ✓ line.
#[derive(Default)]
pub struct SpinnerProgress {
    current: Mutex<Option<Step>>,
}

impl SpinnerProgress {
    fn next(&self, done: Option<String>, upcoming: Option<&str>) {
        let Ok(mut current) = self.current.lock() else {
            return;
        };

        if let Some(step) = current.take() {
            match done {
                Some(line) => step.spinner.finish_with_message(format!(
                    "{} {} {}",
                    style("✓").green().bold(),
                    line,
                    style(format!("[{}]", format_duration(step.started.elapsed()))).dim()
                )),
                None => step.spinner.finish_and_clear(),
            }
        }

        *current = upcoming.map(|msg| Step {
            spinner: create_spinner(msg),
            started: Instant::now(),
        });
    }

    /// Drop the running spinner, e.g. when the run failed.
    pub fn abandon(&self) {
        if let Ok(mut current) = self.current.lock()
            && let Some(step) = current.take()
        {
            step.spinner.abandon();
        }
    }
}

impl ProgressSink for SpinnerProgress {
    fn stage(&self, stage: &Stage) {
        match stage {
            Stage::Idle => self.next(None, Some("Extracting audio...")),
            Stage::AudioExtracted { cached } => self.next(
                Some(format!("Audio extracted{}", cached_note(*cached))),
                Some("Transcribing..."),
            ),
            Stage::Transcribed {
                cached,
                segments,
                language,
            } => self.next(
                Some(format!(
                    "Transcribed: {} segments, {}{}",
                    segments,
                    style(language).yellow(),
                    cached_note(*cached)
                )),
                Some("Scoring segments..."),
            ),
            Stage::Scored { kept } => self.next(
                Some(format!("Scored: {kept} segments above threshold")),
                Some("Planning reels..."),
            ),
            Stage::Planned { reels, empty } => {
                let skipped = if *empty > 0 {
                    format!(" {}", style(format!("({empty} skipped)")).yellow())
                } else {
                    String::new()
                };
                self.next(
                    Some(format!("Planned {reels} reels{skipped}")),
                    Some("Cutting clips..."),
                )
            }
            Stage::Done { reels, failures } => {
                let failed = if *failures > 0 {
                    format!(" {}", style(format!("({failures} failures)")).red())
                } else {
                    String::new()
                };
                self.next(Some(format!("Compiled {reels} reels{failed}")), None)
            }
        }
    }

    fn reel(&self, reel_index: usize, state: ReelState) {
        let Ok(current) = self.current.lock() else {
            return;
        };
        let Some(step) = current.as_ref() else {
            return;
        };

        let n = reel_index + 1;
        match state {
            ReelState::Extracting => step
                .spinner
                .set_message(format!("Cutting clips for reel {n}...")),
            ReelState::Compiling => step.spinner.set_message(format!("Compiling reel {n}...")),
            ReelState::Compiled => step
                .spinner
                .println(format!("  {} reel {n}", style("+").green())),
            ReelState::Failed => step
                .spinner
                .println(format!("  {} reel {n} failed", style("✗").red())),
            ReelState::SkippedEmpty => step
                .spinner
                .println(format!("  {} reel {n} skipped", style("-").dim())),
        }
    }
}

fn cached_note(cached: bool) -> String {
    if cached {
        format!(" {}", style("(cached)").dim())
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_switch_to_minutes_after_a_minute() {
        assert_eq!(format_duration(Duration::from_millis(12_340)), "12.3s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }
}
