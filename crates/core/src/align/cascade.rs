//! Recovery of cascading misalignments.
//!
//! One bad boundary tends to shift every following āya until the aligner
//! resynchronizes, leaving a run of consecutive low-similarity results.
//! Each such run is re-solved locally, with one āya of context on each
//! side, and the replacement is accepted only under conservative gates so
//! an already-good neighbor is never traded away.

use crate::align::cost::{segment_span, silences_in_window};
use crate::align::dp::{align_dp, DpOptions};
use crate::types::{AlignmentResult, Ayah, Segment, SilenceSpan};

/// Āyāt of context added on each side of a cascade before re-solving.
const CONTEXT_AYAHS: usize = 1;

/// Slop when collecting the segments covering the extended window.
const WINDOW_PAD_S: f64 = 0.5;

/// Group-size cap for the local re-solve.
const RESOLVE_MAX_GROUP: usize = 6;

/// Results at or above this are protected by the strict gates.
const GOOD_SIM: f64 = 0.75;
/// Results at or above this are protected by the lenient gate.
const FAIR_SIM: f64 = 0.5;
/// Maximum similarity drop allowed for a protected result.
const GOOD_MAX_DROP: f64 = 0.08;
const FAIR_MAX_DROP: f64 = 0.12;
/// A protected result may never end below this.
const GOOD_FLOOR: f64 = 0.70;
/// Required mean improvement over the window interior.
const MIN_AVG_GAIN: f64 = 0.08;

/// Maximal runs of consecutive results with similarity under `threshold`,
/// keeping only runs of at least `min_len`. Half-open index ranges.
pub fn find_cascades(
    results: &[AlignmentResult],
    threshold: f64,
    min_len: usize,
) -> Vec<(usize, usize)> {
    let mut cascades = Vec::new();
    let mut i = 0;
    while i < results.len() {
        if results[i].similarity < threshold {
            let start = i;
            while i < results.len() && results[i].similarity < threshold {
                i += 1;
            }
            if i - start >= min_len {
                cascades.push((start, i));
            }
        } else {
            i += 1;
        }
    }
    cascades
}

fn accept_recovery(old: &[AlignmentResult], new: &[AlignmentResult]) -> bool {
    for (o, n) in old.iter().zip(new.iter()) {
        let drop = o.similarity - n.similarity;
        if o.similarity >= GOOD_SIM && drop > GOOD_MAX_DROP {
            return false;
        }
        if o.similarity >= FAIR_SIM && drop > FAIR_MAX_DROP {
            return false;
        }
        if o.similarity >= GOOD_SIM && n.similarity < GOOD_FLOOR {
            return false;
        }
    }

    // Judge the mean on the window interior; the edges are context
    let (lo, hi) = if old.len() > 2 {
        (1, old.len() - 1)
    } else {
        (0, old.len())
    };
    if hi <= lo {
        return false;
    }
    let span = (hi - lo) as f64;
    let old_avg = old[lo..hi].iter().map(|r| r.similarity).sum::<f64>() / span;
    let new_avg = new[lo..hi].iter().map(|r| r.similarity).sum::<f64>() / span;
    new_avg > old_avg + MIN_AVG_GAIN
}

/// Re-solve the extended window with silence-aware DP.
fn resolve_window(
    segments: &[Segment],
    silences: &[SilenceSpan],
    window: &[AlignmentResult],
) -> Option<Vec<AlignmentResult>> {
    let win_start = window.first()?.start;
    let win_end = window.last()?.end;

    let (lo, hi) = segment_span(segments, win_start, win_end, WINDOW_PAD_S)?;
    let sub_segments = &segments[lo..hi];
    let sub_ayahs: Vec<Ayah> = window.iter().map(|r| r.ayah.clone()).collect();
    if sub_segments.len() < sub_ayahs.len() {
        return None;
    }

    let window_silences = silences_in_window(silences, win_start, win_end);
    let opts = DpOptions {
        max_group: RESOLVE_MAX_GROUP,
        relax_on_infeasible: false,
    };
    let dp = align_dp(sub_segments, &sub_ayahs, &window_silences, &opts, None);
    if !dp.complete || dp.results.len() != window.len() {
        return None;
    }

    if accept_recovery(window, &dp.results) {
        Some(dp.results)
    } else {
        None
    }
}

/// Detect cascades in `results` and replace the ones whose local re-solve
/// passes the acceptance gates. Cascades are processed right to left so
/// earlier indices stay valid.
pub fn recover_cascades(
    segments: &[Segment],
    silences: &[SilenceSpan],
    results: Vec<AlignmentResult>,
    threshold: f64,
    min_len: usize,
) -> Vec<AlignmentResult> {
    if results.is_empty() {
        return results;
    }

    let cascades = find_cascades(&results, threshold, min_len);
    if cascades.is_empty() {
        return results;
    }

    let mut out = results;
    for &(cascade_start, cascade_end) in cascades.iter().rev() {
        let ext_start = cascade_start.saturating_sub(CONTEXT_AYAHS);
        let ext_end = (cascade_end + CONTEXT_AYAHS).min(out.len());
        if let Some(recovered) = resolve_window(segments, silences, &out[ext_start..ext_end]) {
            log::debug!(
                "Recovered cascade over ayahs {}..={}",
                out[ext_start].ayah.ayah_number,
                out[ext_end - 1].ayah.ayah_number
            );
            out.splice(ext_start..ext_end, recovered);
        }
    }
    out
}
