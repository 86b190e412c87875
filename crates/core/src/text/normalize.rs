//! Arabic text canonicalization for comparison.
//!
//! Recited transcripts and canonical āya text differ in orthography
//! (hamza carriers, diacritics, punctuation) far more than in letters.
//! Folding both sides into one comparison form is what makes the
//! similarity scores meaningful.

lazy_static::lazy_static! {
    /// Letter folds applied before comparison: alef variants collapse to
    /// bare alef, final yā loses its dots, tā marbūṭa opens to hā.
    static ref LETTER_FOLDS: Vec<(char, char)> = vec![
        ('أ', 'ا'), ('إ', 'ا'), ('آ', 'ا'),
        ('ى', 'ي'),
        ('ة', 'ه'),
    ];
}

/// Tatweel is a letter-class codepoint but carries no content.
const TATWEEL: char = '\u{0640}';

fn fold_letter(c: char) -> char {
    for (from, to) in LETTER_FOLDS.iter() {
        if c == *from {
            return *to;
        }
    }
    c
}

/// Canonicalize Arabic text for comparison.
///
/// Folds letter variants, strips everything that is neither a letter nor
/// whitespace (diacritics, punctuation, digits, tatweel), collapses
/// whitespace runs, and trims. Idempotent.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .chars()
        .map(fold_letter)
        .filter(|&c| (c.is_alphabetic() && c != TATWEEL) || c.is_whitespace())
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Space-joined first `n` normalized words (all of them when fewer).
pub fn first_words(text: &str, n: usize) -> String {
    let normalized = normalize(text);
    let words: Vec<&str> = normalized.split_whitespace().collect();
    words[..n.min(words.len())].join(" ")
}

/// Space-joined last `n` normalized words (all of them when fewer).
pub fn last_words(text: &str, n: usize) -> String {
    let normalized = normalize(text);
    let words: Vec<&str> = normalized.split_whitespace().collect();
    words[words.len() - n.min(words.len())..].join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_alef_variants() {
        assert_eq!(normalize("أإآا"), "اااا");
        assert_eq!(normalize("إياك"), "اياك");
    }

    #[test]
    fn test_normalize_ya_and_ta_marbuta() {
        assert_eq!(normalize("هدى"), "هدي");
        assert_eq!(normalize("رحمة"), "رحمه");
    }

    #[test]
    fn test_normalize_strips_diacritics() {
        assert_eq!(normalize("بِسْمِ اللَّهِ"), "بسم الله");
        assert_eq!(normalize("الرَّحْمَٰنِ"), "الرحمن");
    }

    #[test]
    fn test_normalize_strips_tatweel_and_punctuation() {
        assert_eq!(normalize("الـــلّه"), "الله");
        assert_eq!(normalize("قال: «نعم»!"), "قال نعم");
    }

    #[test]
    fn test_normalize_strips_digits() {
        assert_eq!(normalize("الفاتحة 1"), "الفاتحه");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  بسم   الله \n الرحمن  "), "بسم الله الرحمن");
    }

    #[test]
    fn test_normalize_idempotent() {
        let samples = [
            "بِسْمِ اللَّهِ الرَّحْمَٰنِ الرَّحِيمِ",
            "إِيَّاكَ نَعْبُدُ وَإِيَّاكَ نَسْتَعِينُ",
            "",
            "  plain ascii  ",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("  \t "), "");
        assert_eq!(normalize("!!!"), "");
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("الحمد لله رب العالمين"), 4);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("  واحد  "), 1);
    }

    #[test]
    fn test_first_last_words() {
        let text = "الحمد لله رب العالمين";
        assert_eq!(first_words(text, 2), "الحمد لله");
        assert_eq!(last_words(text, 2), "رب العالمين");
        // Asking for more words than exist returns everything
        assert_eq!(first_words("الحمد", 3), "الحمد");
        assert_eq!(last_words("الحمد", 3), "الحمد");
        assert_eq!(first_words("", 2), "");
    }

    #[test]
    fn test_first_last_words_normalized() {
        assert_eq!(last_words("رَبِّ الْعَالَمِينَ", 1), "العالمين");
    }
}
