//! Edge costs and silence-boundary bonuses for the grouping DP.

use std::collections::HashSet;

use crate::text::similarity::ratio;
use crate::types::{Segment, SilenceSpan};

/// A segment end within this many seconds of a silence start counts as
/// snapped to that silence. Shared by the full-sūra DP, cascade recovery,
/// and zone re-solves.
pub const SILENCE_SNAP_S: f64 = 0.3;

/// Cost credit for a grouping whose last segment ends on a silence
/// boundary.
pub const SILENCE_BONUS: f64 = 0.15;

/// Cost of assigning a merged segment text to an āya.
///
/// Both arguments must already be in comparison form. Lower is better.
pub fn alignment_cost(merged: &str, ayah: &str) -> f64 {
    1.0 - ratio(merged, ayah)
}

/// Boundary indices snapped to a silence.
///
/// Boundary `i` sits after segment `i - 1`; it is snapped when that
/// segment's end falls within [`SILENCE_SNAP_S`] of some silence start.
pub fn silence_snapped_bounds(segments: &[Segment], silences: &[SilenceSpan]) -> HashSet<usize> {
    let mut bounds = HashSet::new();
    for (idx, seg) in segments.iter().enumerate() {
        for sil in silences {
            if (seg.end - sil.start_s()).abs() < SILENCE_SNAP_S {
                bounds.insert(idx + 1);
                break;
            }
        }
    }
    bounds
}

/// Silences whose start falls inside [start, end] seconds.
pub fn silences_in_window(silences: &[SilenceSpan], start: f64, end: f64) -> Vec<SilenceSpan> {
    silences
        .iter()
        .copied()
        .filter(|s| s.start_s() >= start && s.start_s() <= end)
        .collect()
}

/// Contiguous index span of segments lying inside [start - pad, end + pad].
///
/// Returns a half-open range, or None when no segment qualifies.
pub(crate) fn segment_span(
    segments: &[Segment],
    start: f64,
    end: f64,
    pad: f64,
) -> Option<(usize, usize)> {
    let mut first = None;
    let mut last = None;
    for (idx, seg) in segments.iter().enumerate() {
        if seg.start >= start - pad && seg.end <= end + pad {
            if first.is_none() {
                first = Some(idx);
            }
            last = Some(idx);
        }
    }
    Some((first?, last? + 1))
}
