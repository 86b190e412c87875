//! Hybrid alignment: DP with per-āya fallback and repair.
//!
//! Runs the DP aligner over the whole sūra, then revisits every result
//! below the quality threshold: long āyāt get a split-and-restitch at
//! silence boundaries, and the greedy aligner's answer for the same āya
//! is taken when it scores strictly higher.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::align::dp::{align_dp, DpOptions};
use crate::align::greedy::align_greedy;
use crate::align::AlignerConfig;
use crate::text::normalize::word_count;
use crate::text::similarity::text_similarity;
use crate::types::{AlignmentResult, Ayah, Segment, SilenceSpan};

/// A silence must overlap the āya's span by at least this long to split it.
const SPLIT_MIN_SILENCE_S: f64 = 0.2;

/// Split-and-restitch must improve similarity by more than this.
const SPLIT_IMPROVE_MIN: f64 = 0.05;

/// Slop when collecting the segments covering an āya's span.
const SPLIT_RANGE_PAD_S: f64 = 0.5;

/// Per-source counts from one hybrid run.
///
/// Every emitted result lands in exactly one category, so the category
/// sum always equals `total`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HybridStats {
    pub total: usize,
    /// High-quality DP results kept as-is
    pub dp_kept: usize,
    /// Results taken from the greedy aligner
    pub greedy_fallback: usize,
    /// Results improved by split-and-restitch
    pub split_improved: usize,
    /// Results still under the quality threshold after all attempts
    pub still_low: usize,
}

impl fmt::Display for HybridStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hybrid: total={} dp_kept={} greedy_fallback={} split_improved={} still_low={}",
            self.total, self.dp_kept, self.greedy_fallback, self.split_improved, self.still_low
        )
    }
}

/// Outcome of a hybrid run.
#[derive(Debug, Clone)]
pub struct HybridOutcome {
    pub results: Vec<AlignmentResult>,
    pub stats: HybridStats,
    /// False when some āyāt received no result at all
    pub complete: bool,
}

enum Source {
    Dp,
    Split,
    Greedy,
}

/// Silences clipped to [start, end], keeping those that overlap it by at
/// least [`SPLIT_MIN_SILENCE_S`]. Input order (sorted by start) is kept.
fn silences_overlapping(silences: &[SilenceSpan], start: f64, end: f64) -> Vec<(f64, f64)> {
    let mut found = Vec::new();
    for sil in silences {
        let (s, e) = (sil.start_s(), sil.end_s());
        if e > start && s < end {
            let clipped = (s.max(start), e.min(end));
            if clipped.1 - clipped.0 >= SPLIT_MIN_SILENCE_S {
                found.push(clipped);
            }
        }
    }
    found
}

/// Partition the segments covering [start, end] into chunks separated by
/// the silences inside that span.
fn split_at_silences<'a>(
    segments: &'a [Segment],
    silences: &[SilenceSpan],
    start: f64,
    end: f64,
) -> Vec<Vec<&'a Segment>> {
    let range: Vec<&Segment> = segments
        .iter()
        .filter(|s| s.start >= start - SPLIT_RANGE_PAD_S && s.end <= end + SPLIT_RANGE_PAD_S)
        .collect();
    if range.is_empty() {
        return Vec::new();
    }

    let sils = silences_overlapping(silences, start, end);
    if sils.is_empty() {
        return vec![range];
    }

    let mut chunks: Vec<Vec<&Segment>> = Vec::new();
    let mut current: Vec<&Segment> = Vec::new();
    let mut sil_idx = 0;
    for seg in range {
        if sil_idx < sils.len() {
            let (sil_start, sil_end) = sils[sil_idx];
            if seg.end <= sil_start {
                current.push(seg);
            } else if seg.start >= sil_end {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                current.push(seg);
                sil_idx += 1;
            } else {
                // Segment straddles the silence; close the chunk on it
                current.push(seg);
                chunks.push(std::mem::take(&mut current));
                sil_idx += 1;
            }
        } else {
            current.push(seg);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Rebuild a long āya's text from silence-separated chunks.
///
/// Returns an improved result only when the restitched text scores more
/// than [`SPLIT_IMPROVE_MIN`] better than the DP result.
fn try_split_restitch(
    segments: &[Segment],
    silences: &[SilenceSpan],
    dp_r: &AlignmentResult,
) -> Option<AlignmentResult> {
    if silences.is_empty() {
        return None;
    }

    let chunks = split_at_silences(segments, silences, dp_r.start, dp_r.end);
    if chunks.len() <= 1 {
        return None;
    }

    let texts: Vec<String> = chunks
        .iter()
        .map(|chunk| {
            chunk
                .iter()
                .map(|s| s.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|t| !t.is_empty())
        .collect();
    if texts.is_empty() {
        return None;
    }

    let merged = texts.join(" ");
    let similarity = text_similarity(&merged, &dp_r.ayah.text);
    if similarity > dp_r.similarity + SPLIT_IMPROVE_MIN {
        Some(AlignmentResult {
            text: merged,
            similarity,
            ..dp_r.clone()
        })
    } else {
        None
    }
}

/// Align with DP, then improve every result under the quality threshold.
pub fn align_hybrid(
    segments: &[Segment],
    ayahs: &[Ayah],
    silences: &[SilenceSpan],
    config: &AlignerConfig,
    on_progress: Option<&dyn Fn(usize, usize)>,
) -> HybridOutcome {
    let mut stats = HybridStats::default();
    if segments.is_empty() || ayahs.is_empty() {
        return HybridOutcome {
            results: Vec::new(),
            stats,
            complete: ayahs.is_empty(),
        };
    }

    let opts = DpOptions {
        max_group: config.effective_max_group(ayahs.len()),
        relax_on_infeasible: true,
    };
    let dp = align_dp(segments, ayahs, silences, &opts, on_progress);
    let greedy = align_greedy(segments, ayahs);

    // Nothing from DP at all: the greedy result is all we have
    if dp.results.is_empty() {
        stats.total = greedy.len();
        stats.greedy_fallback = greedy.len();
        let complete = greedy.len() == ayahs.len();
        return HybridOutcome {
            results: greedy,
            stats,
            complete,
        };
    }

    let greedy_by_ayah: HashMap<u32, &AlignmentResult> =
        greedy.iter().map(|r| (r.ayah.ayah_number, r)).collect();

    let mut results = Vec::with_capacity(ayahs.len());
    for dp_r in &dp.results {
        stats.total += 1;

        if dp_r.similarity >= config.quality_threshold {
            stats.dp_kept += 1;
            results.push(dp_r.clone());
            continue;
        }

        let is_long = word_count(&dp_r.ayah.text) > config.long_ayah_words
            || dp_r.duration() > config.long_ayah_duration_s;

        let mut best = dp_r.clone();
        let mut source = Source::Dp;

        if is_long {
            if let Some(split) = try_split_restitch(segments, silences, dp_r) {
                if split.similarity > best.similarity {
                    best = split;
                    source = Source::Split;
                }
            }
        }

        if let Some(greedy_r) = greedy_by_ayah.get(&dp_r.ayah.ayah_number) {
            if greedy_r.similarity > best.similarity {
                best = (*greedy_r).clone();
                source = Source::Greedy;
            }
        }

        match source {
            Source::Greedy => stats.greedy_fallback += 1,
            Source::Split => stats.split_improved += 1,
            Source::Dp if best.similarity < config.quality_threshold => stats.still_low += 1,
            Source::Dp => stats.dp_kept += 1,
        }
        results.push(best);
    }

    // DP stopped early: take the greedy answers for the unreached tail
    if !dp.complete {
        let last_number = results.last().map(|r| r.ayah.ayah_number);
        for greedy_r in &greedy {
            if last_number.map_or(true, |n| greedy_r.ayah.ayah_number > n) {
                stats.total += 1;
                stats.greedy_fallback += 1;
                results.push(greedy_r.clone());
            }
        }
    }

    let complete = results.len() == ayahs.len();
    HybridOutcome {
        results,
        stats,
        complete,
    }
}
