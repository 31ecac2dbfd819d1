use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

/// Private-use stand-ins for the two markup-significant characters.
pub const LT_GUARD: char = '\u{E0A0}';
pub const AMP_GUARD: char = '\u{E0A1}';

pub const DIFF_START: &str = "<span class='difference'>";
pub const DIFF_END: &str = "</span>";

/// `value` carried by markers that wrap a number copied from the query.
pub const AUTO_TRANSLATION: &str = "auto-translation";

pub const TERM_MARKER_NAME: &str = "mrk";

static DIFF_SPAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        "(?s){}(.*?){}",
        regex::escape(DIFF_START),
        regex::escape(DIFF_END)
    ))
    .expect("diff span regex")
});

/// Replaces `<` and `&` so that diffing and splicing can never cut through
/// markup syntax. Apply before any diff or substring search.
pub fn guard(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '<' => out.push(LT_GUARD),
            '&' => out.push(AMP_GUARD),
            _ => out.push(ch),
        }
    }
    out
}

/// Inverse of [`guard`]. Apply only once markup has been rebuilt.
pub fn unguard(text: &str) -> String {
    if !has_sentinels(text) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            LT_GUARD => out.push('<'),
            AMP_GUARD => out.push('&'),
            _ => out.push(ch),
        }
    }
    out
}

#[inline]
pub fn has_sentinels(text: &str) -> bool {
    text.contains([LT_GUARD, AMP_GUARD])
}

/// Number of difference spans in a tagged string.
pub fn count_diffs(tagged: &str) -> usize {
    DIFF_SPAN_RE.find_iter(tagged).count()
}

/// Byte ranges of the difference spans of `tagged`, measured in the text
/// with the markers removed, left to right.
pub fn diff_ranges(tagged: &str) -> Vec<Range<usize>> {
    let marker_len = DIFF_START.len() + DIFF_END.len();
    DIFF_SPAN_RE
        .captures_iter(tagged)
        .enumerate()
        .filter_map(|(n, c)| {
            let whole = c.get(0)?;
            let inner = c.get(1)?;
            let start = whole.start() - n * marker_len;
            Some(start..start + inner.len())
        })
        .collect()
}

/// Hands out `mrkN` ids for one assembly call.
#[derive(Debug, Clone)]
pub struct MarkerIds {
    next: u32,
}

impl MarkerIds {
    pub fn starting_at(first: u32) -> Self {
        Self { next: first }
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.saturating_add(1);
        id
    }
}

impl Default for MarkerIds {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

/// Inline term annotation. `display` must already be guarded; `value` is
/// plain text and gets attribute-escaped here.
pub fn term_marker(id: u32, value: &str, display: &str) -> String {
    format!(
        "<{TERM_MARKER_NAME} type=\"term\" id=\"mrk{id}\" value=\"{}\">{display}</{TERM_MARKER_NAME}>",
        escape_attr(value)
    )
}

pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
