//! Alignment strategies, post-processing passes, and the facade.
//!
//! [`Aligner`] is the single entry point: it validates inputs, runs the
//! configured strategy, then chains cascade recovery, zone realignment,
//! and overlap fixing.

pub mod cascade;
pub mod cost;
pub mod dp;
pub mod greedy;
pub mod hybrid;
pub mod zones;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::error::{AlignError, InputError};
use crate::types::{AlignmentResult, Ayah, Segment, SilenceSpan};

pub use dp::{align_dp, DpOptions, DpOutcome};
pub use greedy::align_greedy;
pub use hybrid::{align_hybrid, HybridOutcome, HybridStats};
pub use zones::{fix_overlaps, OverlapPolicy};

/// Sūras with more āyāt than this get a wider default grouping cap.
const LONG_SURA_AYAHS: usize = 100;

/// Available alignment strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentStrategy {
    /// Fast cue-driven merging
    Greedy,
    /// Optimal grouping over the whole sūra
    Dp,
    /// DP with per-āya fallback and repair (recommended)
    Hybrid,
}

impl AlignmentStrategy {
    /// Parse a strategy name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "greedy" => Ok(Self::Greedy),
            "dp" => Ok(Self::Dp),
            "hybrid" | "auto" => Ok(Self::Hybrid),
            _ => bail!("Unknown strategy: '{}'. Available: greedy, dp, hybrid", name),
        }
    }
}

/// Tunable knobs for the aligner facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignerConfig {
    pub strategy: AlignmentStrategy,
    /// Similarity at or above this counts as a high-quality alignment
    pub quality_threshold: f64,
    /// Run zone realignment to repair timing drift
    pub fix_drift: bool,
    /// Make adjacent results non-overlapping
    pub fix_overlaps: bool,
    pub overlap_policy: OverlapPolicy,
    /// Maximum segments merged into one āya
    pub max_segments_per_ayah: usize,
    /// Similarity under this counts toward a cascade
    pub cascade_threshold: f64,
    pub min_cascade_length: usize,
    /// Word count past which an āya counts as long
    pub long_ayah_words: usize,
    /// Duration past which an āya counts as long
    pub long_ayah_duration_s: f64,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            strategy: AlignmentStrategy::Hybrid,
            quality_threshold: 0.85,
            fix_drift: true,
            fix_overlaps: true,
            overlap_policy: OverlapPolicy::default(),
            max_segments_per_ayah: 6,
            cascade_threshold: 0.7,
            min_cascade_length: 2,
            long_ayah_words: 30,
            long_ayah_duration_s: 30.0,
        }
    }
}

impl AlignerConfig {
    /// Effective grouping cap for a sūra of `ayah_count` āyāt.
    pub(crate) fn effective_max_group(&self, ayah_count: usize) -> usize {
        if ayah_count > LONG_SURA_AYAHS {
            self.max_segments_per_ayah.max(8)
        } else {
            self.max_segments_per_ayah
        }
    }
}

/// Unified alignment interface.
///
/// Owns no state across calls beyond the statistics of the last run; a
/// single instance may align any number of sūras in sequence.
pub struct Aligner {
    config: AlignerConfig,
    last_stats: Option<HybridStats>,
    last_partial: bool,
}

impl Aligner {
    pub fn new(config: AlignerConfig) -> Self {
        Self {
            config,
            last_stats: None,
            last_partial: false,
        }
    }

    /// Default configuration with the given strategy.
    pub fn with_strategy(strategy: AlignmentStrategy) -> Self {
        Self::new(AlignerConfig {
            strategy,
            ..AlignerConfig::default()
        })
    }

    pub fn config(&self) -> &AlignerConfig {
        &self.config
    }

    /// Statistics from the last hybrid run, if any.
    pub fn last_stats(&self) -> Option<&HybridStats> {
        self.last_stats.as_ref()
    }

    /// True when the last run's primary strategy fell short of a full
    /// partition and fallbacks had to fill in (or could not).
    pub fn last_partial(&self) -> bool {
        self.last_partial
    }

    /// Align transcribed segments to canonical āyāt.
    ///
    /// Inputs are read-only; only āya-bearing segments are consumed.
    /// `on_progress` is called on the aligning thread, at most once per
    /// completed āya row of the main DP.
    pub fn align(
        &mut self,
        segments: &[Segment],
        ayahs: &[Ayah],
        silences: &[SilenceSpan],
        on_progress: Option<&dyn Fn(usize, usize)>,
    ) -> std::result::Result<Vec<AlignmentResult>, AlignError> {
        validate_inputs(segments, ayahs, silences)?;
        self.last_stats = None;
        self.last_partial = false;

        let recitation: Vec<Segment> = segments
            .iter()
            .filter(|s| s.kind.is_ayah_bearing())
            .cloned()
            .collect();
        if recitation.is_empty() || ayahs.is_empty() {
            return Ok(Vec::new());
        }

        log::debug!(
            "Aligning {} segments to {} ayahs ({:?})",
            recitation.len(),
            ayahs.len(),
            self.config.strategy
        );

        let mut results = match self.config.strategy {
            AlignmentStrategy::Greedy => align_greedy(&recitation, ayahs),
            AlignmentStrategy::Dp => self.run_dp(&recitation, ayahs, silences, on_progress)?,
            AlignmentStrategy::Hybrid => {
                let outcome = align_hybrid(&recitation, ayahs, silences, &self.config, on_progress);
                self.last_partial = !outcome.complete;
                self.last_stats = Some(outcome.stats);
                if outcome.results.is_empty() {
                    return Err(AlignError::Infeasible {
                        reached: 0,
                        total: ayahs.len(),
                    });
                }
                outcome.results
            }
        };

        if !results.is_empty() {
            results = cascade::recover_cascades(
                &recitation,
                silences,
                results,
                self.config.cascade_threshold,
                self.config.min_cascade_length,
            );

            if self.config.fix_drift {
                let (realigned, zone_count) = zones::realign_problem_zones(
                    results,
                    &recitation,
                    silences,
                    self.config.quality_threshold,
                );
                let (realigned, anchor_count) = zones::realign_from_anchors(
                    realigned,
                    &recitation,
                    silences,
                    self.config.quality_threshold,
                );
                if zone_count + anchor_count > 0 {
                    log::info!(
                        "Drift repair: {} zone(s) and {} anchor gap(s) realigned",
                        zone_count,
                        anchor_count
                    );
                }
                results = realigned;
            }

            if self.config.fix_overlaps {
                let fixes = zones::fix_overlaps(&mut results, self.config.overlap_policy);
                if fixes > 0 {
                    log::debug!("Fixed {} overlapping result(s)", fixes);
                }
            }
        }

        Ok(results)
    }

    /// DP strategy with its failure chain: the partial prefix plus the
    /// greedy answers for whatever the prefix did not reach.
    fn run_dp(
        &mut self,
        segments: &[Segment],
        ayahs: &[Ayah],
        silences: &[SilenceSpan],
        on_progress: Option<&dyn Fn(usize, usize)>,
    ) -> std::result::Result<Vec<AlignmentResult>, AlignError> {
        let opts = DpOptions {
            max_group: self.config.effective_max_group(ayahs.len()),
            relax_on_infeasible: true,
        };
        let outcome = align_dp(segments, ayahs, silences, &opts, on_progress);
        if outcome.complete {
            return Ok(outcome.results);
        }

        self.last_partial = true;
        let reached = outcome.results.len();
        let mut results = outcome.results;
        let last_number = results.last().map(|r| r.ayah.ayah_number);
        for greedy_r in align_greedy(segments, ayahs) {
            if last_number.map_or(true, |n| greedy_r.ayah.ayah_number > n) {
                results.push(greedy_r);
            }
        }

        if results.is_empty() {
            return Err(AlignError::Infeasible {
                reached,
                total: ayahs.len(),
            });
        }
        Ok(results)
    }
}

/// Align with default settings and the given strategy.
pub fn align(
    segments: &[Segment],
    ayahs: &[Ayah],
    silences: &[SilenceSpan],
    strategy: AlignmentStrategy,
) -> std::result::Result<Vec<AlignmentResult>, AlignError> {
    Aligner::with_strategy(strategy).align(segments, ayahs, silences, None)
}

fn validate_inputs(
    segments: &[Segment],
    ayahs: &[Ayah],
    silences: &[SilenceSpan],
) -> std::result::Result<(), InputError> {
    let mut prev_start = f64::NEG_INFINITY;
    for seg in segments {
        if seg.start < 0.0 || seg.end < seg.start {
            return Err(InputError::BadSegmentInterval { id: seg.id });
        }
        if seg.start < prev_start {
            return Err(InputError::UnorderedSegments { id: seg.id });
        }
        prev_start = seg.start;
    }

    if ayahs.is_empty() && !segments.is_empty() {
        return Err(InputError::MissingAyahs {
            segments: segments.len(),
        });
    }

    for (index, sil) in silences.iter().enumerate() {
        if sil.end_ms <= sil.start_ms {
            return Err(InputError::BadSilence { index });
        }
    }

    Ok(())
}
