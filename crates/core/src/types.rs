use serde::{Deserialize, Serialize};

/// Classification of a transcribed segment.
///
/// The transcription layer tags non-recitation phrases so the aligner can
/// skip them; only `Ayah` segments carry recited text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Recited āya content
    Ayah,
    /// Isti'adha preamble ("I seek refuge...")
    Istiadha,
    /// Basmala outside sūra 1
    Basmala,
}

impl SegmentKind {
    /// True for segments the aligner should consume.
    pub fn is_ayah_bearing(self) -> bool {
        matches!(self, SegmentKind::Ayah)
    }
}

fn default_segment_kind() -> SegmentKind {
    SegmentKind::Ayah
}

/// A transcribed span of audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: u64,
    pub sura_id: u32,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Raw transcribed text (may carry diacritics and punctuation)
    pub text: String,
    /// Recognizer confidence, when the backend reports one
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default = "default_segment_kind")]
    pub kind: SegmentKind,
}

impl Segment {
    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// One āya of the canonical text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ayah {
    pub sura_id: u32,
    /// 1-indexed position within the sūra
    pub ayah_number: u32,
    pub text: String,
}

/// A detected span of silence, in milliseconds.
///
/// Serialized as a `[start_ms, end_ms]` pair to match the silence
/// detector's output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u64, u64)", into = "(u64, u64)")]
pub struct SilenceSpan {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl SilenceSpan {
    pub fn start_s(&self) -> f64 {
        self.start_ms as f64 / 1000.0
    }

    pub fn end_s(&self) -> f64 {
        self.end_ms as f64 / 1000.0
    }
}

impl From<(u64, u64)> for SilenceSpan {
    fn from((start_ms, end_ms): (u64, u64)) -> Self {
        Self { start_ms, end_ms }
    }
}

impl From<SilenceSpan> for (u64, u64) {
    fn from(span: SilenceSpan) -> Self {
        (span.start_ms, span.end_ms)
    }
}

/// Timing and text the aligner assigned to one āya.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub ayah: Ayah,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Space-joined raw text of the assigned segments
    pub text: String,
    /// Similarity against the canonical text, 0.0..=1.0
    pub similarity: f64,
    /// True when duplicated tokens were dropped while merging
    pub overlap: bool,
}

impl AlignmentResult {
    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Serialize for JSON output.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "sura_id": self.ayah.sura_id,
            "ayah_number": self.ayah.ayah_number,
            "start": (self.start * 10000.0).round() / 10000.0,
            "end": (self.end * 10000.0).round() / 10000.0,
            "duration": (self.duration() * 10000.0).round() / 10000.0,
            "text": self.text,
            "similarity": (self.similarity * 10000.0).round() / 10000.0,
            "overlap": self.overlap,
        })
    }
}
