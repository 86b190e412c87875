//! Arabic text canonicalization and similarity scoring.

pub mod normalize;
pub mod similarity;

pub use normalize::{first_words, last_words, normalize, word_count};
pub use similarity::{ratio, text_similarity};
