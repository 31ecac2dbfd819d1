//! Difference tagging between two plain texts.
//!
//! A tagger returns both texts with every maximal differing span wrapped in
//! `<span class='difference'>..</span>`. The assembler reads the spans back
//! with [`DiffSpans::from_tagged`], so inputs must be guarded first.
//!
//! [`LcsDifferenceTagger`] compares token sequences (alphanumeric runs, or
//! single characters for CJK and punctuation) with a longest-common-subsequence
//! alignment. Every maximal run of unmatched tokens is a hunk; a hunk may be
//! empty on one side (pure insertion or deletion).

use std::ops::Range;

use crate::sentinels::{diff_ranges, DIFF_END, DIFF_START};
use crate::textutil::is_word_char;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub a: Range<usize>,
    pub b: Range<usize>,
}

/// Non-empty differing spans of each side, left to right.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSpans {
    pub a: Vec<Range<usize>>,
    pub b: Vec<Range<usize>>,
}

impl DiffSpans {
    #[must_use]
    pub fn from_hunks(hunks: &[Hunk]) -> Self {
        Self {
            a: hunks
                .iter()
                .filter(|h| !h.a.is_empty())
                .map(|h| h.a.clone())
                .collect(),
            b: hunks
                .iter()
                .filter(|h| !h.b.is_empty())
                .map(|h| h.b.clone())
                .collect(),
        }
    }

    /// Spans of a tagged pair, as ranges of the untagged texts.
    #[must_use]
    pub fn from_tagged(tagged_a: &str, tagged_b: &str) -> Self {
        Self {
            a: diff_ranges(tagged_a),
            b: diff_ranges(tagged_b),
        }
    }
}

pub trait DifferenceTagger: Send + Sync {
    /// Both texts with each differing span wrapped in the difference marker.
    fn tag(&self, a: &str, b: &str) -> (String, String);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LcsDifferenceTagger;

impl DifferenceTagger for LcsDifferenceTagger {
    fn tag(&self, a: &str, b: &str) -> (String, String) {
        let spans = DiffSpans::from_hunks(&self.hunks(a, b));
        (wrap_spans(a, &spans.a), wrap_spans(b, &spans.b))
    }
}

impl LcsDifferenceTagger {
    #[must_use]
    pub fn hunks(&self, a: &str, b: &str) -> Vec<Hunk> {
        let ta = tokenize(a);
        let tb = tokenize(b);
        let n = ta.len();
        let m = tb.len();

        // lcs[i][j] = LCS length of ta[i..] and tb[j..]
        let width = m + 1;
        let mut lcs = vec![0u32; (n + 1) * width];
        for i in (0..n).rev() {
            for j in (0..m).rev() {
                lcs[i * width + j] = if a[ta[i].clone()] == b[tb[j].clone()] {
                    lcs[(i + 1) * width + j + 1] + 1
                } else {
                    lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
                };
            }
        }

        let mut hunks = Vec::new();
        let mut open: Option<(usize, usize)> = None;
        let (mut i, mut j) = (0usize, 0usize);
        let pos_a = |i: usize| ta.get(i).map_or(a.len(), |r| r.start);
        let pos_b = |j: usize| tb.get(j).map_or(b.len(), |r| r.start);

        while i < n || j < m {
            let same = i < n
                && j < m
                && a[ta[i].clone()] == b[tb[j].clone()]
                && lcs[i * width + j] == lcs[(i + 1) * width + j + 1] + 1;
            if same {
                if let Some((sa, sb)) = open.take() {
                    hunks.push(Hunk {
                        a: sa..pos_a(i),
                        b: sb..pos_b(j),
                    });
                }
                i += 1;
                j += 1;
                continue;
            }
            if open.is_none() {
                open = Some((pos_a(i), pos_b(j)));
            }
            if j >= m || (i < n && lcs[(i + 1) * width + j] >= lcs[i * width + j + 1]) {
                i += 1;
            } else {
                j += 1;
            }
        }
        if let Some((sa, sb)) = open {
            hunks.push(Hunk {
                a: sa..a.len(),
                b: sb..b.len(),
            });
        }
        hunks
    }
}

fn tokenize(text: &str) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut run: Option<usize> = None;
    for (idx, ch) in text.char_indices() {
        let wordy = is_word_char(ch);
        match (wordy, run) {
            (true, None) => run = Some(idx),
            (true, Some(_)) => {}
            (false, started) => {
                if let Some(s) = started {
                    out.push(s..idx);
                    run = None;
                }
                out.push(idx..idx + ch.len_utf8());
            }
        }
    }
    if let Some(s) = run {
        out.push(s..text.len());
    }
    out
}

/// Wraps each of `spans` (ascending, disjoint) in the difference marker.
pub fn wrap_spans(text: &str, spans: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(text.len() + spans.len() * (DIFF_START.len() + DIFF_END.len()));
    let mut pos = 0usize;
    for r in spans {
        out.push_str(&text[pos..r.start]);
        out.push_str(DIFF_START);
        out.push_str(&text[r.clone()]);
        out.push_str(DIFF_END);
        pos = r.end;
    }
    out.push_str(&text[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentinels::count_diffs;

    fn texts(s: &str, spans: &[Range<usize>]) -> Vec<String> {
        spans.iter().map(|r| s[r.clone()].to_string()).collect()
    }

    #[test]
    fn single_word_substitution() {
        let a = "Delete 5 files";
        let b = "Delete 3 files";
        let spans = DiffSpans::from_hunks(&LcsDifferenceTagger.hunks(a, b));
        assert_eq!(texts(a, &spans.a), vec!["5"]);
        assert_eq!(texts(b, &spans.b), vec!["3"]);
        assert_eq!(spans.a.len(), spans.b.len());
    }

    #[test]
    fn tagged_output_wraps_each_span() {
        let (a, b) = ("Open the red door", "Open the blue window");
        let (ta, tb) = LcsDifferenceTagger.tag(a, b);
        assert_eq!(count_diffs(&ta), 2);
        assert_eq!(count_diffs(&tb), 2);
        assert!(ta.starts_with("Open the "));

        let spans = DiffSpans::from_tagged(&ta, &tb);
        assert_eq!(texts(a, &spans.a), vec!["red", "door"]);
        assert_eq!(texts(b, &spans.b), vec!["blue", "window"]);
        assert_eq!(spans, DiffSpans::from_hunks(&LcsDifferenceTagger.hunks(a, b)));
    }

    #[test]
    fn insertion_is_asymmetric() {
        let a = "Save the file";
        let b = "Save the file now";
        let spans = DiffSpans::from_hunks(&LcsDifferenceTagger.hunks(a, b));
        assert!(spans.a.is_empty());
        assert_eq!(texts(b, &spans.b), vec![" now"]);
        let (ta, tb) = LcsDifferenceTagger.tag(a, b);
        assert_eq!((count_diffs(&ta), count_diffs(&tb)), (0, 1));
    }

    #[test]
    fn identical_texts_have_no_hunks() {
        assert!(LcsDifferenceTagger.hunks("same text", "same text").is_empty());
        let (ta, _) = LcsDifferenceTagger.tag("same text", "same text");
        assert_eq!(ta, "same text");
    }

    #[test]
    fn cjk_differs_per_character() {
        let a = "猫が好き";
        let b = "犬が好き";
        let spans = DiffSpans::from_hunks(&LcsDifferenceTagger.hunks(a, b));
        assert_eq!(texts(a, &spans.a), vec!["猫"]);
        assert_eq!(texts(b, &spans.b), vec!["犬"]);
    }

    #[test]
    fn empty_sides() {
        let hunks = LcsDifferenceTagger.hunks("", "abc");
        assert_eq!(hunks, vec![Hunk { a: 0..0, b: 0..3 }]);
        assert!(LcsDifferenceTagger.hunks("", "").is_empty());
    }
}
