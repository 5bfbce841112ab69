use crate::types::{RunOutcome, ScoredSegment};

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// One `Start/End` line per segment of a reel.
pub fn format_reel_timestamps(segments: &[ScoredSegment]) -> String {
    segments
        .iter()
        .map(|seg| format!("Start: {:.2}, End: {:.2}\n", seg.padded_start, seg.padded_end))
        .collect()
}

/// Human-readable listing of every segment that passed the threshold.
pub fn format_scoring_report(segments: &[ScoredSegment]) -> String {
    let mut output = String::new();
    for seg in segments {
        output.push_str(&format!("Text: {}\n", seg.text.trim()));
        output.push_str(&format!("Start Time: {}s\n", seg.padded_start));
        output.push_str(&format!("End Time: {}s\n", seg.padded_end));
        output.push_str(&format!("Importance Score: {}\n", seg.importance_score));
        output.push_str(&"=".repeat(40));
        output.push('\n');
    }
    output
}

pub fn format_outcome_readable(outcome: &RunOutcome) -> String {
    let mut output = String::new();

    output.push_str("## Reels\n\n");
    if outcome.reels.is_empty() {
        output.push_str("No reel was produced.\n");
    }
    for reel in &outcome.reels {
        output.push_str(&format!(
            "### Reel {} ({:.1}s) {}\n\n",
            reel.index + 1,
            reel.duration(),
            reel.file_path.display()
        ));
        for seg in &reel.segments {
            output.push_str(&format!(
                "• [{}–{}] ({:.2}) {}\n",
                format_timestamp(seg.start),
                format_timestamp(seg.end),
                seg.importance_score,
                seg.text.trim()
            ));
        }
        output.push('\n');
    }

    if !outcome.failures.is_empty() {
        output.push_str("## Failures\n\n");
        for failure in &outcome.failures {
            match failure.segment_index {
                Some(segment) => output.push_str(&format!(
                    "• Reel {} segment #{}: {}\n",
                    failure.reel_index + 1,
                    segment,
                    failure.reason
                )),
                None => output.push_str(&format!(
                    "• Reel {}: {}\n",
                    failure.reel_index + 1,
                    failure.reason
                )),
            }
        }
        output.push('\n');
    }

    output
}
