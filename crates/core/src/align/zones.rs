//! Drift repair and overlap enforcement.
//!
//! Long recitations accumulate timing drift: a stretch of low-similarity
//! results sandwiched between good ones usually means the segment
//! boundaries slid, not that the recitation diverged. Both passes here
//! re-solve such stretches locally and keep the replacement only when the
//! mean similarity improves. The overlap fixer then guarantees adjacent
//! results never share time.

use serde::{Deserialize, Serialize};

use crate::align::cascade::find_cascades;
use crate::align::cost::{segment_span, silences_in_window};
use crate::align::dp::{align_dp, DpOptions};
use crate::types::{AlignmentResult, Ayah, Segment, SilenceSpan};

/// Minimum run of low results that makes a problem zone.
const ZONE_MIN_RUN: usize = 3;

/// Segment window padding for problem-zone re-solves.
const ZONE_PAD_S: f64 = 10.0;

/// Minimum gap length for anchor-based realignment.
const ANCHOR_GAP_MIN: usize = 3;

/// Segment window padding for anchor-gap re-solves.
const ANCHOR_PAD_S: f64 = 5.0;

/// Group-size cap for zone re-solves.
const ZONE_MAX_GROUP: usize = 6;

/// Which result's timing yields when two adjacent results overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Push the later result's start up to the earlier result's end
    #[default]
    ShiftNextStart,
    /// Pull the earlier result's end down to the later result's start
    TrimPrevEnd,
}

fn mean_similarity(results: &[AlignmentResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    results.iter().map(|r| r.similarity).sum::<f64>() / results.len() as f64
}

/// Re-solve one window of results over a padded segment range. Returns
/// the replacement only when the mean similarity improves.
fn resolve_zone(
    segments: &[Segment],
    silences: &[SilenceSpan],
    window: &[AlignmentResult],
    pad: f64,
) -> Option<Vec<AlignmentResult>> {
    let win_start = window.first()?.start - pad;
    let win_end = window.last()?.end + pad;

    let (lo, hi) = segment_span(segments, win_start, win_end, 0.0)?;
    let sub_segments = &segments[lo..hi];
    if sub_segments.len() < window.len() {
        return None;
    }
    let sub_ayahs: Vec<Ayah> = window.iter().map(|r| r.ayah.clone()).collect();

    let window_silences = silences_in_window(silences, win_start, win_end);
    let opts = DpOptions {
        max_group: ZONE_MAX_GROUP,
        relax_on_infeasible: false,
    };
    let dp = align_dp(sub_segments, &sub_ayahs, &window_silences, &opts, None);
    if !dp.complete || dp.results.len() != window.len() {
        return None;
    }

    if mean_similarity(&dp.results) > mean_similarity(window) {
        Some(dp.results)
    } else {
        None
    }
}

/// Realign maximal runs of at least 3 results under the quality
/// threshold, each over a ±10 s segment window. Returns the results and
/// the number of zones replaced.
pub fn realign_problem_zones(
    results: Vec<AlignmentResult>,
    segments: &[Segment],
    silences: &[SilenceSpan],
    quality_threshold: f64,
) -> (Vec<AlignmentResult>, usize) {
    if results.is_empty() {
        return (results, 0);
    }

    let zones = find_cascades(&results, quality_threshold, ZONE_MIN_RUN);
    let mut out = results;
    let mut fixed = 0;
    for &(zone_start, zone_end) in zones.iter().rev() {
        if let Some(better) = resolve_zone(segments, silences, &out[zone_start..zone_end], ZONE_PAD_S)
        {
            log::debug!(
                "Realigned problem zone over ayahs {}..={}",
                out[zone_start].ayah.ayah_number,
                out[zone_end - 1].ayah.ayah_number
            );
            out.splice(zone_start..zone_end, better);
            fixed += 1;
        }
    }
    (out, fixed)
}

/// Realign gaps of at least 3 low results bounded on both sides by
/// anchor results (similarity at or above the quality threshold). The
/// anchors themselves are never touched.
pub fn realign_from_anchors(
    results: Vec<AlignmentResult>,
    segments: &[Segment],
    silences: &[SilenceSpan],
    quality_threshold: f64,
) -> (Vec<AlignmentResult>, usize) {
    if results.is_empty() {
        return (results, 0);
    }

    // Runs are maximal, so a run away from the list edges is bounded by
    // results at or above the threshold on both sides: anchors.
    let gaps: Vec<(usize, usize)> = find_cascades(&results, quality_threshold, ANCHOR_GAP_MIN)
        .into_iter()
        .filter(|&(start, end)| start > 0 && end < results.len())
        .collect();

    let mut out = results;
    let mut fixed = 0;
    for &(gap_start, gap_end) in gaps.iter().rev() {
        if let Some(better) = resolve_zone(segments, silences, &out[gap_start..gap_end], ANCHOR_PAD_S)
        {
            log::debug!(
                "Realigned anchor gap over ayahs {}..={}",
                out[gap_start].ayah.ayah_number,
                out[gap_end - 1].ayah.ayah_number
            );
            out.splice(gap_start..gap_end, better);
            fixed += 1;
        }
    }
    (out, fixed)
}

/// Make adjacent results non-overlapping in place.
///
/// Scans left to right; every pair with `next.start < prev.end` is fixed
/// according to `policy`, clamping degenerate spans so a rescan finds no
/// overlap at all. Returns the number of fixes applied.
pub fn fix_overlaps(results: &mut [AlignmentResult], policy: OverlapPolicy) -> usize {
    let mut fixes = 0;
    for i in 1..results.len() {
        if results[i].start < results[i - 1].end {
            match policy {
                OverlapPolicy::ShiftNextStart => {
                    results[i].start = results[i - 1].end;
                    if results[i].end < results[i].start {
                        results[i].end = results[i].start;
                    }
                }
                OverlapPolicy::TrimPrevEnd => {
                    results[i - 1].end = results[i].start;
                    if results[i - 1].start > results[i - 1].end {
                        results[i - 1].start = results[i - 1].end;
                    }
                }
            }
            fixes += 1;
        }
    }
    fixes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SegmentKind;

    fn make_segment(id: u64, start: f64, end: f64, text: &str) -> Segment {
        Segment {
            id,
            sura_id: 1,
            start,
            end,
            text: text.to_string(),
            confidence: None,
            kind: SegmentKind::Ayah,
        }
    }

    fn make_ayah(number: u32, text: &str) -> Ayah {
        Ayah {
            sura_id: 1,
            ayah_number: number,
            text: text.to_string(),
        }
    }

    fn make_result(number: u32, text: &str, start: f64, end: f64, sim: f64) -> AlignmentResult {
        AlignmentResult {
            ayah: make_ayah(number, text),
            start,
            end,
            text: text.to_string(),
            similarity: sim,
            overlap: false,
        }
    }

    fn span_result(start: f64, end: f64) -> AlignmentResult {
        make_result(1, "نص", start, end, 0.9)
    }

    /// A sūra where the middle three results drifted: segments sit far
    /// from the anchors so the padded window catches only them.
    fn drifted_fixture() -> (Vec<Segment>, Vec<AlignmentResult>) {
        let texts = [
            "بسم الله الرحمن الرحيم",
            "الحمد لله رب العالمين",
            "الرحمن الرحيم",
            "مالك يوم الدين",
            "اياك نعبد واياك نستعين",
        ];
        let segments = vec![
            make_segment(1, 0.0, 2.0, texts[0]),
            make_segment(2, 15.0, 17.0, texts[1]),
            make_segment(3, 17.0, 19.0, texts[2]),
            make_segment(4, 19.0, 21.0, texts[3]),
            make_segment(5, 35.0, 37.0, texts[4]),
        ];
        let drifted = |number: u32, ayah_text: &str, text: &str, start: f64, end: f64| {
            AlignmentResult {
                ayah: make_ayah(number, ayah_text),
                start,
                end,
                text: text.to_string(),
                similarity: 0.5,
                overlap: false,
            }
        };
        let results = vec![
            make_result(1, texts[0], 0.0, 2.0, 0.95),
            drifted(2, texts[1], "الحمد لله مالك", 15.0, 18.0),
            drifted(3, texts[2], "رب الرحمن", 18.0, 19.5),
            drifted(4, texts[3], "يوم الدين الرحيم", 19.5, 21.0),
            make_result(5, texts[4], 35.0, 37.0, 0.95),
        ];
        (segments, results)
    }

    #[test]
    fn test_realign_problem_zone() {
        let (segments, results) = drifted_fixture();
        let (fixed_results, count) = realign_problem_zones(results, &segments, &[], 0.85);
        assert_eq!(count, 1);
        assert_eq!(fixed_results.len(), 5);
        for r in &fixed_results[1..4] {
            assert!(r.similarity > 0.99, "zone not realigned: {}", r.similarity);
        }
        // Anchors untouched
        assert_eq!(fixed_results[0].similarity, 0.95);
        assert_eq!(fixed_results[4].similarity, 0.95);
        assert_eq!((fixed_results[1].start, fixed_results[1].end), (15.0, 17.0));
    }

    #[test]
    fn test_realign_from_anchors() {
        let (segments, results) = drifted_fixture();
        let (fixed_results, count) = realign_from_anchors(results, &segments, &[], 0.85);
        assert_eq!(count, 1);
        for r in &fixed_results[1..4] {
            assert!(r.similarity > 0.99);
        }
        assert_eq!(fixed_results[0].similarity, 0.95);
        assert_eq!(fixed_results[4].similarity, 0.95);
    }

    #[test]
    fn test_anchor_gap_requires_both_anchors() {
        let (segments, mut results) = drifted_fixture();
        // Drop the left anchor: the low run now touches the list edge
        results.remove(0);
        let (kept, count) = realign_from_anchors(results, &segments, &[], 0.85);
        assert_eq!(count, 0);
        assert_eq!(kept[0].similarity, 0.5);
    }

    #[test]
    fn test_short_runs_are_left_alone() {
        let results = vec![
            make_result(1, "بسم الله", 0.0, 1.0, 0.5),
            make_result(2, "الحمد لله", 1.0, 2.0, 0.5),
            make_result(3, "الرحمن الرحيم", 2.0, 3.0, 0.9),
        ];
        let segments = vec![make_segment(1, 0.0, 3.0, "بسم الله")];
        let (kept, count) = realign_problem_zones(results, &segments, &[], 0.85);
        assert_eq!(count, 0);
        assert_eq!(kept[0].similarity, 0.5);
    }

    #[test]
    fn test_fix_overlaps_shift_next_start() {
        let mut results = vec![
            span_result(0.0, 5.0),
            span_result(4.0, 10.0),
            span_result(10.0, 15.0),
        ];
        let fixes = fix_overlaps(&mut results, OverlapPolicy::ShiftNextStart);
        assert_eq!(fixes, 1);
        assert_eq!((results[0].start, results[0].end), (0.0, 5.0));
        assert_eq!((results[1].start, results[1].end), (5.0, 10.0));
        assert_eq!((results[2].start, results[2].end), (10.0, 15.0));
    }

    #[test]
    fn test_fix_overlaps_trim_prev_end() {
        let mut results = vec![span_result(0.0, 5.0), span_result(4.0, 10.0)];
        let fixes = fix_overlaps(&mut results, OverlapPolicy::TrimPrevEnd);
        assert_eq!(fixes, 1);
        assert_eq!((results[0].start, results[0].end), (0.0, 4.0));
        assert_eq!((results[1].start, results[1].end), (4.0, 10.0));
    }

    #[test]
    fn test_fix_overlaps_terminates_on_nested_spans() {
        let mut results = vec![
            span_result(0.0, 10.0),
            span_result(2.0, 3.0),
            span_result(4.0, 12.0),
        ];
        let fixes = fix_overlaps(&mut results, OverlapPolicy::ShiftNextStart);
        assert_eq!(fixes, 2);
        for pair in results.windows(2) {
            assert!(pair[1].start >= pair[0].end, "overlap survived the fix");
        }
        for r in &results {
            assert!(r.start <= r.end);
        }
    }

    #[test]
    fn test_fix_overlaps_clean_input() {
        let mut results = vec![span_result(0.0, 5.0), span_result(5.0, 10.0)];
        assert_eq!(fix_overlaps(&mut results, OverlapPolicy::default()), 0);
    }
}
