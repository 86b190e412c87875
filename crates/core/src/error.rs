use thiserror::Error;

/// Input validation failures.
///
/// Surfaced before any alignment work happens; no partial results
/// accompany them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("segment {id} starts before the previous segment")]
    UnorderedSegments { id: u64 },

    #[error("segment {id} has a negative time or ends before it starts")]
    BadSegmentInterval { id: u64 },

    #[error("ayah list is empty but {segments} segments were provided")]
    MissingAyahs { segments: usize },

    #[error("silence interval {index} has end <= start")]
    BadSilence { index: usize },
}

/// Errors the alignment engine reports to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    #[error("no feasible alignment: reached {reached} of {total} ayahs")]
    Infeasible { reached: usize, total: usize },
}
