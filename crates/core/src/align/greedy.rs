//! Cue-driven linear alignment.
//!
//! Walks segments left to right, merging them into the current āya until
//! an end-of-āya cue fires: the buffer's tail matches the āya's tail, the
//! next segment opens the next āya, or the input runs out. Fast and
//! order-preserving, but not optimal; the hybrid path uses it as a
//! per-āya fallback.

use std::collections::HashMap;

use crate::text::normalize::{first_words, last_words, normalize, word_count};
use crate::text::similarity::ratio;
use crate::types::{AlignmentResult, Ayah, Segment};

/// Tail similarity at or above this ends the current āya.
const TAIL_MATCH_MIN: f64 = 0.6;

/// Head similarity above this means the next segment starts the next āya.
const HEAD_MATCH_MIN: f64 = 0.6;

/// Words compared by the tail and head cues, capped by the āya's length.
const MAX_CUE_WORDS: usize = 3;

fn cue_width(ayah_text: &str) -> usize {
    word_count(ayah_text).min(MAX_CUE_WORDS).max(1)
}

/// Append `next` to `buffer`, dropping the leading run of tokens that
/// duplicates buffer content. Token identity is judged on normalized
/// forms; a duplicate is dropped at most as often as it occurs in the
/// buffer, and the first novel token ends the dropping.
fn merge_without_overlap(buffer: &str, next: &str) -> (String, bool) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in normalize(buffer).split_whitespace() {
        *counts.entry(word.to_string()).or_insert(0) += 1;
    }

    let mut kept: Vec<&str> = Vec::new();
    let mut dropped = false;
    let mut in_prefix = true;
    for word in next.split_whitespace() {
        if in_prefix {
            let key = normalize(word);
            if let Some(count) = counts.get_mut(&key) {
                if *count > 0 {
                    *count -= 1;
                    dropped = true;
                    continue;
                }
            }
            in_prefix = false;
        }
        kept.push(word);
    }

    if kept.is_empty() {
        (buffer.trim().to_string(), dropped)
    } else {
        (format!("{} {}", buffer.trim(), kept.join(" ")), dropped)
    }
}

/// Align segments to āyāt with the cue-driven walk.
///
/// Emits results in āya order; stops after the last segment, so trailing
/// āyāt may receive nothing.
pub fn align_greedy(segments: &[Segment], ayahs: &[Ayah]) -> Vec<AlignmentResult> {
    let mut results = Vec::new();
    let mut i = 0;

    for (a_idx, ayah) in ayahs.iter().enumerate() {
        if i >= segments.len() {
            break;
        }

        let start = segments[i].start;
        let mut end = segments[i].end;
        let mut text = segments[i].text.trim().to_string();
        let mut overlap = false;

        loop {
            let width = cue_width(&ayah.text);
            let tail_sim = ratio(&last_words(&text, width), &last_words(&ayah.text, width));
            if tail_sim >= TAIL_MATCH_MIN {
                break;
            }

            if i + 1 >= segments.len() {
                break;
            }

            if let Some(next_ayah) = ayahs.get(a_idx + 1) {
                let next_width = cue_width(&next_ayah.text);
                let head_sim = ratio(
                    &first_words(&segments[i + 1].text, next_width),
                    &first_words(&next_ayah.text, next_width),
                );
                if head_sim > HEAD_MATCH_MIN {
                    break;
                }
            }

            let (merged, did_drop) = merge_without_overlap(&text, &segments[i + 1].text);
            text = merged;
            overlap |= did_drop;
            end = segments[i + 1].end;
            i += 1;
        }

        let similarity = ratio(&normalize(&text), &normalize(&ayah.text));
        results.push(AlignmentResult {
            ayah: ayah.clone(),
            start,
            end,
            text,
            similarity,
            overlap,
        });
        i += 1;
    }

    results
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

    #[test]
    fn test_exact_one_segment_per_ayah() {
        let segments = vec![
            make_segment(1, 0.0, 1.0, "بسم الله"),
            make_segment(2, 1.0, 2.0, "الحمد لله"),
        ];
        let ayahs = vec![make_ayah(1, "بسم الله"), make_ayah(2, "الحمد لله")];
        let results = align_greedy(&segments, &ayahs);
        assert_eq!(results.len(), 2);
        assert!(results[0].similarity >= 0.99);
        assert_eq!((results[0].start, results[0].end), (0.0, 1.0));
        assert_eq!((results[1].start, results[1].end), (1.0, 2.0));
    }

    #[test]
    fn test_ayah_split_across_segments() {
        let segments = vec![
            make_segment(1, 0.0, 1.5, "الحمد لله"),
            make_segment(2, 1.5, 3.0, "رب العالمين"),
        ];
        let ayahs = vec![make_ayah(1, "الحمد لله رب العالمين")];
        let results = align_greedy(&segments, &ayahs);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "الحمد لله رب العالمين");
        assert!(results[0].similarity >= 0.99);
        assert_eq!((results[0].start, results[0].end), (0.0, 3.0));
        assert!(!results[0].overlap);
    }

    #[test]
    fn test_overlap_token_dropped_once() {
        let segments = vec![
            make_segment(1, 0.0, 2.0, "الحمد لله رب العالمين"),
            make_segment(2, 2.0, 4.0, "العالمين الرحمن الرحيم"),
        ];
        let ayahs = vec![make_ayah(1, "الحمد لله رب العالمين الرحمن الرحيم")];
        let results = align_greedy(&segments, &ayahs);
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert!(r.overlap);
        assert_eq!(r.text.matches("العالمين").count(), 1);
        assert_eq!(r.text, "الحمد لله رب العالمين الرحمن الرحيم");
    }

    #[test]
    fn test_head_match_ends_ayah_early() {
        // The buffer never matches ayah 1's tail, but the next segment
        // clearly opens ayah 2, so ayah 1 is finalized before merging.
        let segments = vec![
            make_segment(1, 0.0, 1.0, "طه ويس"),
            make_segment(2, 1.0, 4.0, "ما انزلنا عليك القران لتشقي"),
        ];
        let ayahs = vec![
            make_ayah(1, "طه"),
            make_ayah(2, "ما انزلنا عليك القران لتشقي"),
        ];
        let results = align_greedy(&segments, &ayahs);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "طه ويس");
        assert_eq!((results[0].start, results[0].end), (0.0, 1.0));
        assert!(results[1].similarity >= 0.99);
    }

    #[test]
    fn test_end_of_input_emits_prefix() {
        let segments = vec![make_segment(1, 0.0, 1.0, "نص لا يشبه شيئا")];
        let ayahs = vec![make_ayah(1, "بسم الله"), make_ayah(2, "الحمد لله")];
        let results = align_greedy(&segments, &ayahs);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].ayah.ayah_number, 1);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(align_greedy(&[], &[make_ayah(1, "بسم الله")]).is_empty());
        assert!(align_greedy(&[make_segment(1, 0.0, 1.0, "بسم")], &[]).is_empty());
    }

    #[test]
    fn test_merge_without_overlap_prefix_multiset() {
        // Two copies of the token in the buffer allow two drops
        let (merged, dropped) = merge_without_overlap("الله الله نور", "الله الله اكبر");
        assert!(dropped);
        assert_eq!(merged, "الله الله نور اكبر");
    }

    #[test]
    fn test_merge_without_overlap_stops_at_novel_token() {
        // A duplicate past the first novel token is kept
        let (merged, dropped) = merge_without_overlap("قل هو الله", "احد الله الصمد");
        assert!(!dropped);
        assert_eq!(merged, "قل هو الله احد الله الصمد");
    }

    #[test]
    fn test_merge_without_overlap_all_duplicated() {
        let (merged, dropped) = merge_without_overlap("بسم الله", "بسم الله");
        assert!(dropped);
        assert_eq!(merged, "بسم الله");
    }

    #[test]
    fn test_merge_without_overlap_normalized_identity() {
        // Diacritics do not defeat the duplicate check
        let (merged, dropped) = merge_without_overlap("رب العالمين", "الْعَالَمِينَ الرحمن");
        assert!(dropped);
        assert_eq!(merged, "رب العالمين الرحمن");
    }
}
