//! Tartil CLI — align recited Quran audio transcripts to canonical āyāt.
//!
//! Consumes the JSON artifacts of the transcription and silence-detection
//! steps and writes one timing record per āya.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::de::DeserializeOwned;

use tartil_core::{Aligner, AlignerConfig, AlignmentStrategy, Ayah, Segment, SilenceSpan};

#[derive(Parser)]
#[command(
    name = "tartil",
    about = "Align recited Quran audio segments to canonical ayah text",
    version,
)]
struct Cli {
    /// JSON file with transcribed segments
    #[arg(long)]
    segments: PathBuf,

    /// JSON file with the sura's canonical ayahs
    #[arg(long)]
    ayahs: PathBuf,

    /// JSON file with detected silences as [start_ms, end_ms] pairs
    #[arg(long)]
    silences: Option<PathBuf>,

    /// Alignment strategy
    #[arg(long, default_value = "hybrid", value_parser = ["greedy", "dp", "hybrid"])]
    strategy: String,

    /// Similarity threshold for high-quality alignment
    #[arg(long, default_value_t = 0.85)]
    quality_threshold: f64,

    /// Maximum segments merged into one ayah
    #[arg(long, default_value_t = 6)]
    max_segments_per_ayah: usize,

    /// Skip zone realignment (drift repair)
    #[arg(long, default_value_t = false)]
    no_drift_fix: bool,

    /// Skip overlap fixing
    #[arg(long, default_value_t = false)]
    no_overlap_fix: bool,

    /// Output JSON path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let segments: Vec<Segment> = read_json(&cli.segments)?;
    let ayahs: Vec<Ayah> = read_json(&cli.ayahs)?;
    let silences: Vec<SilenceSpan> = match &cli.silences {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    log::info!(
        "Loaded {} segments, {} ayahs, {} silences",
        segments.len(),
        ayahs.len(),
        silences.len()
    );

    let config = AlignerConfig {
        strategy: AlignmentStrategy::from_name(&cli.strategy)?,
        quality_threshold: cli.quality_threshold,
        max_segments_per_ayah: cli.max_segments_per_ayah,
        fix_drift: !cli.no_drift_fix,
        fix_overlaps: !cli.no_overlap_fix,
        ..AlignerConfig::default()
    };

    let mut aligner = Aligner::new(config);
    let progress = |done: usize, total: usize| {
        log::debug!("Aligned ayah row {}/{}", done, total);
    };
    let results = aligner.align(&segments, &ayahs, &silences, Some(&progress))?;

    log::info!("Aligned {} of {} ayahs", results.len(), ayahs.len());
    if let Some(stats) = aligner.last_stats() {
        log::info!("{}", stats);
    }
    if aligner.last_partial() {
        log::warn!("Alignment incomplete: some ayahs received no segments");
    }

    let values: Vec<serde_json::Value> = results.iter().map(|r| r.to_json_value()).collect();
    let json = serde_json::to_string_pretty(&values)?;
    match &cli.output {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))
}
