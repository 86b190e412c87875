//! Optimal segment-to-āya assignment over one sūra.
//!
//! Solves the grouping lattice with dynamic programming: dp[i][j] is the
//! minimum cost of assigning the first i segments to the first j āyāt,
//! where each āya takes a contiguous group of 1..=K segments. Groupings
//! that end on a silence boundary earn a cost credit.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::align::cost::{alignment_cost, silence_snapped_bounds, SILENCE_BONUS};
use crate::text::normalize::normalize;
use crate::text::similarity::ratio;
use crate::types::{AlignmentResult, Ayah, Segment, SilenceSpan};

/// Knobs for one DP run.
#[derive(Debug, Clone)]
pub struct DpOptions {
    /// Maximum segments merged into one āya
    pub max_group: usize,
    /// Retry once with a wider cap when no full partition exists
    pub relax_on_infeasible: bool,
}

impl Default for DpOptions {
    fn default() -> Self {
        Self {
            max_group: 6,
            relax_on_infeasible: true,
        }
    }
}

/// Outcome of a DP run.
#[derive(Debug, Clone)]
pub struct DpOutcome {
    /// One result per assigned āya, in āya order
    pub results: Vec<AlignmentResult>,
    /// False when only a prefix of the āya list could be assigned
    pub complete: bool,
    /// Total cost along the chosen path
    pub total_cost: f64,
}

/// Normalized merged text for every (end, size) grouping.
///
/// Entry (i, k) holds the comparison form of segments[i-k..i]. The
/// normalizer runs once per segment; merges reuse those results.
struct MergedCache {
    rows: Vec<Vec<String>>,
}

impl MergedCache {
    fn new(seg_norms: &[String], max_group: usize) -> Self {
        let mut rows = Vec::with_capacity(seg_norms.len());
        for i in 1..=seg_norms.len() {
            let kmax = max_group.min(i);
            let mut row = Vec::with_capacity(kmax);
            let mut acc = String::new();
            for k in 1..=kmax {
                let piece = &seg_norms[i - k];
                if !piece.is_empty() {
                    if acc.is_empty() {
                        acc = piece.clone();
                    } else {
                        acc = format!("{} {}", piece, acc);
                    }
                }
                row.push(acc.clone());
            }
            rows.push(row);
        }
        Self { rows }
    }

    fn get(&self, end: usize, size: usize) -> &str {
        &self.rows[end - 1][size - 1]
    }
}

struct DpTable {
    n: usize,
    m: usize,
    /// Row-major (n+1)x(m+1) cost table
    cost: Vec<f64>,
    /// Chosen group size per cell, 0 = unreachable
    group: Vec<u8>,
}

impl DpTable {
    fn at(&self, i: usize, j: usize) -> f64 {
        self.cost[i * (self.m + 1) + j]
    }

    /// Cheapest finite terminal dp[i][m] over i in [m, n]. Trailing
    /// segments past the chosen i stay unassigned.
    fn best_terminal(&self) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for i in self.m..=self.n {
            let c = self.at(i, self.m);
            if c.is_finite() && best.map_or(true, |(_, bc)| c < bc) {
                best = Some((i, c));
            }
        }
        best
    }

    /// Longest assignable āya prefix and its cheapest end state.
    fn best_prefix(&self) -> Option<(usize, usize, f64)> {
        for j in (1..=self.m).rev() {
            let mut best: Option<(usize, f64)> = None;
            for i in j..=self.n {
                let c = self.at(i, j);
                if c.is_finite() && best.map_or(true, |(_, bc)| c < bc) {
                    best = Some((i, c));
                }
            }
            if let Some((i, c)) = best {
                return Some((i, j, c));
            }
        }
        None
    }

    fn backtrack(&self, end_i: usize, end_j: usize) -> Vec<(usize, usize)> {
        let mut groups = Vec::with_capacity(end_j);
        let mut i = end_i;
        for j in (1..=end_j).rev() {
            let k = self.group[i * (self.m + 1) + j] as usize;
            groups.push((i - k, i));
            i -= k;
        }
        groups.reverse();
        groups
    }
}

fn report(on_progress: Option<&dyn Fn(usize, usize)>, done: usize, total: usize) {
    if let Some(cb) = on_progress {
        // A panicking observer must not corrupt the alignment
        let _ = catch_unwind(AssertUnwindSafe(|| cb(done, total)));
    }
}

/// Upper segment index for row j: each remaining āya needs at least one
/// segment when the tail is reserved.
fn row_upper(n: usize, m: usize, j: usize, reserve_tail: bool) -> Option<usize> {
    if reserve_tail {
        n.checked_sub(m - j)
    } else {
        Some(n)
    }
}

fn fill(
    merged: &MergedCache,
    ayah_norms: &[String],
    snapped: &HashSet<usize>,
    n: usize,
    max_group: usize,
    reserve_tail: bool,
    on_progress: Option<&dyn Fn(usize, usize)>,
) -> DpTable {
    let m = ayah_norms.len();
    let max_group = max_group.min(u8::MAX as usize);
    let width = m + 1;
    let mut cost = vec![f64::INFINITY; (n + 1) * width];
    let mut group = vec![0u8; (n + 1) * width];
    cost[0] = 0.0;

    for j in 1..=m {
        if let Some(hi) = row_upper(n, m, j, reserve_tail) {
            let ayah = &ayah_norms[j - 1];
            for i in j..=hi {
                let kmax = max_group.min(i - (j - 1));
                let mut best = f64::INFINITY;
                let mut best_k = 0u8;
                // Descending k so equal costs keep the longer grouping
                for k in (1..=kmax).rev() {
                    let prev = cost[(i - k) * width + (j - 1)];
                    if !prev.is_finite() {
                        continue;
                    }
                    let text = merged.get(i, k);
                    if text.is_empty() {
                        continue;
                    }
                    let mut edge = alignment_cost(text, ayah);
                    if snapped.contains(&i) {
                        edge -= SILENCE_BONUS;
                    }
                    let total = prev + edge;
                    if total < best {
                        best = total;
                        best_k = k as u8;
                    }
                }
                if best_k != 0 {
                    cost[i * width + j] = best;
                    group[i * width + j] = best_k;
                }
            }
        }
        report(on_progress, j, m);
    }

    DpTable { n, m, cost, group }
}

fn build_results(
    segments: &[Segment],
    ayahs: &[Ayah],
    ayah_norms: &[String],
    groups: &[(usize, usize)],
) -> Vec<AlignmentResult> {
    groups
        .iter()
        .enumerate()
        .map(|(jdx, &(s, e))| {
            let group = &segments[s..e];
            let text = group
                .iter()
                .map(|g| g.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            // Recomputed on the final merged text, not the bonus-adjusted cost
            let similarity = ratio(&normalize(&text), &ayah_norms[jdx]);
            AlignmentResult {
                ayah: ayahs[jdx].clone(),
                start: group[0].start,
                end: group[group.len() - 1].end,
                text,
                similarity,
                overlap: false,
            }
        })
        .collect()
}

/// Assign segments to āyāt with minimum total cost.
///
/// Returns one result per āya when a full partition exists. When it does
/// not, the cap is widened once by 2 (if allowed), and failing that the
/// longest assignable prefix is returned with `complete = false`.
pub fn align_dp(
    segments: &[Segment],
    ayahs: &[Ayah],
    silences: &[SilenceSpan],
    opts: &DpOptions,
    on_progress: Option<&dyn Fn(usize, usize)>,
) -> DpOutcome {
    let n = segments.len();
    let m = ayahs.len();
    if n == 0 || m == 0 {
        return DpOutcome {
            results: Vec::new(),
            complete: m == 0,
            total_cost: 0.0,
        };
    }

    let seg_norms: Vec<String> = segments.iter().map(|s| normalize(&s.text)).collect();
    let ayah_norms: Vec<String> = ayahs.iter().map(|a| normalize(&a.text)).collect();
    let snapped = silence_snapped_bounds(segments, silences);

    let widest = if opts.relax_on_infeasible {
        opts.max_group + 2
    } else {
        opts.max_group
    };
    let merged = MergedCache::new(&seg_norms, widest);

    let table = fill(&merged, &ayah_norms, &snapped, n, opts.max_group, true, on_progress);
    if let Some((end_i, total_cost)) = table.best_terminal() {
        let groups = table.backtrack(end_i, m);
        return DpOutcome {
            results: build_results(segments, ayahs, &ayah_norms, &groups),
            complete: true,
            total_cost,
        };
    }

    if opts.relax_on_infeasible {
        log::debug!(
            "No full partition with max_group={}, retrying with {}",
            opts.max_group,
            widest
        );
        let table = fill(&merged, &ayah_norms, &snapped, n, widest, true, None);
        if let Some((end_i, total_cost)) = table.best_terminal() {
            let groups = table.backtrack(end_i, m);
            return DpOutcome {
                results: build_results(segments, ayahs, &ayah_norms, &groups),
                complete: true,
                total_cost,
            };
        }
    }

    // Infeasible even relaxed; keep the longest prefix we can assign
    let table = fill(&merged, &ayah_norms, &snapped, n, widest, false, None);
    match table.best_prefix() {
        Some((end_i, end_j, total_cost)) => {
            log::debug!("Infeasible alignment, keeping prefix of {} of {} ayahs", end_j, m);
            let groups = table.backtrack(end_i, end_j);
            DpOutcome {
                results: build_results(segments, ayahs, &ayah_norms, &groups),
                complete: false,
                total_cost,
            }
        }
        None => DpOutcome {
            results: Vec::new(),
            complete: false,
            total_cost: f64::INFINITY,
        },
    }
}
