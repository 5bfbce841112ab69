//! Segment selection: importance decides membership, time decides order.

use std::cmp::Ordering;

use crate::types::{ReelPlan, ScoredSegment};

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Non-empty plans, ascending by reel index.
    pub plans: Vec<ReelPlan>,
    /// Reel indices that received no segment.
    pub empty_reels: Vec<usize>,
}

/// Highest score first; equal scores keep transcript order.
fn by_importance(a: &ScoredSegment, b: &ScoredSegment) -> Ordering {
    b.importance_score
        .total_cmp(&a.importance_score)
        .then_with(|| a.index.cmp(&b.index))
}

fn by_time(a: &ScoredSegment, b: &ScoredSegment) -> Ordering {
    a.padded_start
        .total_cmp(&b.padded_start)
        .then_with(|| a.start.total_cmp(&b.start))
        .then_with(|| a.index.cmp(&b.index))
}

/// Rank `segments`, deal them into `reel_count` chunks of `segments_per_reel`
/// and put each chunk into playback order.
pub fn plan_reels(
    segments: &[ScoredSegment],
    segments_per_reel: usize,
    reel_count: usize,
) -> Selection {
    let mut ranked: Vec<ScoredSegment> = segments
        .iter()
        .filter(|s| s.padded_end > s.padded_start)
        .cloned()
        .collect();
    ranked.sort_by(by_importance);

    let mut chunks = ranked.chunks(segments_per_reel.max(1));
    let mut plans = Vec::new();
    let mut empty_reels = Vec::new();

    for index in 0..reel_count {
        match chunks.next() {
            Some(chunk) => {
                let mut chunk = chunk.to_vec();
                chunk.sort_by(by_time);
                trim_overlaps(&mut chunk);
                plans.push(ReelPlan {
                    index,
                    segments: chunk,
                });
            }
            None => empty_reels.push(index),
        }
    }

    Selection { plans, empty_reels }
}

/// Padding can make neighbours overlap even when their speech does not.
/// Split the gap between the raw ranges so no footage plays twice.
fn trim_overlaps(chunk: &mut [ScoredSegment]) {
    for i in 1..chunk.len() {
        let (head, tail) = chunk.split_at_mut(i);
        let prev = &mut head[i - 1];
        let next = &mut tail[0];

        if prev.padded_end <= next.padded_start || prev.end > next.start {
            continue;
        }

        let boundary = (prev.end + next.start) / 2.0;
        prev.padded_end = boundary;
        next.padded_start = boundary;
    }
}
