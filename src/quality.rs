use crate::sentinels::LT_GUARD;

/// Characters allowed in a locale-invariant numeric or currency expression.
const NUMERIC_CHARS: &str = "0123456789()+-./*,=#%<>$\u{00A2}\u{00A3}\u{00A4}\u{00A5}\u{20A0}\u{20A1}\u{20AC}";

/// Normalized 0..=100 likeness of two plain texts.
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, a: &str, b: &str) -> u8;
}

/// Normalized Levenshtein distance over characters, as a percentage.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevenshteinSimilarity;

impl SimilarityScorer for LevenshteinSimilarity {
    fn score(&self, a: &str, b: &str) -> u8 {
        if a == b {
            return 100;
        }
        let pct = (strsim::normalized_levenshtein(a, b) * 100.0).round();
        // Only identical texts score 100.
        pct.clamp(0.0, 99.0) as u8
    }
}

/// True for a non-empty run of digits, operators, separators, `#`, `%`,
/// currency symbols and whitespace.
#[must_use]
pub fn is_numeric(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| NUMERIC_CHARS.contains(c) || c == LT_GUARD || c.is_whitespace())
}
