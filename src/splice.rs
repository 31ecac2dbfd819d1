//! Span-list rewriting.
//!
//! Replacements are claimed as byte ranges of an immutable original and the
//! output is rebuilt in one pass, so no offset ever has to be re-located
//! after an edit.

use crate::textutil::is_standalone;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

#[derive(Debug, Clone, Default)]
pub struct SpliceSet {
    splices: Vec<Splice>,
}

impl SpliceSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.splices.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.splices.len()
    }

    #[must_use]
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.splices
            .iter()
            .any(|s| start < s.end && s.start < end)
    }

    /// Claims `start..end`. Empty or overlapping ranges are refused.
    pub fn claim(&mut self, start: usize, end: usize, replacement: impl Into<String>) -> bool {
        if start >= end || self.overlaps(start, end) {
            return false;
        }
        self.splices.push(Splice {
            start,
            end,
            replacement: replacement.into(),
        });
        true
    }

    /// First standalone occurrence of `needle` in `haystack` that does not
    /// touch an already claimed range.
    #[must_use]
    pub fn find_unclaimed(&self, haystack: &str, needle: &str) -> Option<usize> {
        if needle.is_empty() {
            return None;
        }
        let mut from = 0usize;
        while from <= haystack.len() {
            let pos = from + haystack[from..].find(needle)?;
            let end = pos + needle.len();
            if !self.overlaps(pos, end) && is_standalone(haystack, pos..end) {
                return Some(pos);
            }
            let step = haystack[pos..].chars().next().map_or(1, char::len_utf8);
            from = pos + step;
        }
        None
    }

    /// Rebuilds `original` with every claimed range replaced.
    #[must_use]
    pub fn apply(&self, original: &str) -> String {
        if self.splices.is_empty() {
            return original.to_string();
        }
        let mut ordered: Vec<&Splice> = self.splices.iter().collect();
        ordered.sort_by_key(|s| s.start);

        let mut out = String::with_capacity(original.len() + 64 * ordered.len());
        let mut pos = 0usize;
        for s in ordered {
            out.push_str(&original[pos..s.start]);
            out.push_str(&s.replacement);
            pos = s.end;
        }
        out.push_str(&original[pos..]);
        out
    }
}

/// Start of every non-overlapping occurrence of `phrase` in `sentence`
/// that is not part of a longer word or number.
#[must_use]
pub fn standalone_positions(sentence: &str, phrase: &str) -> Vec<usize> {
    if phrase.is_empty() {
        return Vec::new();
    }
    sentence
        .match_indices(phrase)
        .map(|(pos, _)| pos)
        .filter(|&pos| is_standalone(sentence, pos..pos + phrase.len()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_rebuilds_in_order_regardless_of_claim_order() {
        let mut set = SpliceSet::new();
        assert!(set.claim(9, 14, "FILES"));
        assert!(set.claim(0, 6, "REMOVE"));
        assert_eq!(set.apply("Delete 3 files"), "REMOVE 3 FILES");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn overlapping_claims_are_refused() {
        let mut set = SpliceSet::new();
        assert!(set.claim(0, 16, "X"));
        assert!(!set.claim(8, 12, "Y"));
        assert!(!set.claim(3, 3, "empty"));
        assert!(set.claim(16, 22, "Z"));
    }

    #[test]
    fn find_unclaimed_skips_claimed_text() {
        let text = "machine learning machine";
        let mut set = SpliceSet::new();
        assert_eq!(set.find_unclaimed(text, "machine"), Some(0));
        set.claim(0, 16, "T1");
        assert_eq!(set.find_unclaimed(text, "machine"), Some(17));
        assert_eq!(set.find_unclaimed(text, "learning"), None);
        assert_eq!(set.find_unclaimed(text, ""), None);
    }

    #[test]
    fn find_unclaimed_handles_multibyte_text() {
        let text = "機械学習と機械";
        let mut set = SpliceSet::new();
        let first = set.find_unclaimed(text, "機械").unwrap();
        set.claim(first, first + "機械".len(), "T");
        let second = set.find_unclaimed(text, "機械").unwrap();
        assert_eq!(&text[second..], "機械");
    }

    #[test]
    fn find_unclaimed_ignores_matches_inside_words() {
        let set = SpliceSet::new();
        assert_eq!(set.find_unclaimed("concatenate the cat", "cat"), Some(16));
        assert_eq!(set.find_unclaimed("Une voiture bleue", "bleu"), None);
    }

    #[test]
    fn standalone_positions_skip_longer_numbers() {
        assert_eq!(standalone_positions("3 of 3", "3"), vec![0, 5]);
        assert_eq!(standalone_positions("Supprimer 3 fichiers", "3"), vec![10]);
        assert!(standalone_positions("Supprimer trois fichiers (ref 13)", "3").is_empty());
        assert_eq!(standalone_positions("Total : 99.00", "99"), vec![8]);
        assert!(standalone_positions("abc", "").is_empty());
    }
}
