use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters that never belong to a glossary term.
pub const TERM_SEPARATORS: &str = " \u{00A0}\r\n\u{000C}\t\u{2028}\u{2029},.;\":<>¿?¡!()[]{}=+/*\u{00AB}\u{00BB}\u{201C}\u{201D}\u{201E}\u{FF0C}\u{FF1A}\u{FF1B}\u{FF1F}\u{FF01}\u{3001}\u{3002}\u{300C}\u{300D}\u{FF08}\u{FF09}";

static CJK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{Han}\p{Hiragana}\p{Katakana}\p{Hangul}]").expect("cjk regex")
});

/// Word segmentation used by the glossary-only fallback.
pub trait Tokenizer: Send + Sync {
    /// Splits `text` on `separators`. With `contiguous_script` every CJK
    /// character becomes a word of its own.
    fn words(&self, text: &str, separators: &str, contiguous_script: bool) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SeparatorTokenizer;

impl Tokenizer for SeparatorTokenizer {
    fn words(&self, text: &str, separators: &str, contiguous_script: bool) -> Vec<String> {
        let mut out = Vec::new();
        for token in text
            .split(|c: char| separators.contains(c))
            .filter(|t| !t.is_empty())
        {
            if contiguous_script {
                split_cjk_into(token, &mut out);
            } else {
                out.push(token.to_string());
            }
        }
        out
    }
}

fn split_cjk_into(token: &str, out: &mut Vec<String>) {
    let mut pos = 0usize;
    for m in CJK_RE.find_iter(token) {
        if m.start() > pos {
            out.push(token[pos..m.start()].to_string());
        }
        out.push(m.as_str().to_string());
        pos = m.end();
    }
    if pos < token.len() {
        out.push(token[pos..].to_string());
    }
}

#[must_use]
pub fn is_cjk_char(c: char) -> bool {
    let mut buf = [0u8; 4];
    CJK_RE.is_match(c.encode_utf8(&mut buf))
}

/// Letters and digits of space-delimited scripts. A CJK character is a word
/// of its own and never extends its neighbours.
#[must_use]
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() && !is_cjk_char(c)
}

/// True when `range` of `text` neither starts nor ends inside a longer word
/// or number.
#[must_use]
pub fn is_standalone(text: &str, range: Range<usize>) -> bool {
    let inner = &text[range.clone()];
    let (Some(first), Some(last)) = (inner.chars().next(), inner.chars().next_back()) else {
        return false;
    };
    let before = text[..range.start].chars().next_back();
    let after = text[range.end..].chars().next();
    let glued = |edge: char, outer: Option<char>| is_word_char(edge) && outer.is_some_and(is_word_char);
    !glued(first, before) && !glued(last, after)
}

/// Joins a word window the way it would appear in running text.
#[must_use]
pub fn join_phrase(words: &[String], contiguous_script: bool) -> String {
    if contiguous_script {
        words.concat()
    } else {
        words.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_separators() {
        let words = SeparatorTokenizer.words("Hello, big (blue) world!", TERM_SEPARATORS, false);
        assert_eq!(words, vec!["Hello", "big", "blue", "world"]);
    }

    #[test]
    fn contiguous_scripts_split_per_character() {
        let words = SeparatorTokenizer.words("機械学習のUSBモデル。", TERM_SEPARATORS, true);
        assert_eq!(
            words,
            vec!["機", "械", "学", "習", "の", "USB", "モ", "デ", "ル"]
        );
    }

    #[test]
    fn empty_text_has_no_words() {
        assert!(SeparatorTokenizer.words("  ,, ", TERM_SEPARATORS, false).is_empty());
    }

    #[test]
    fn joins_phrases() {
        let w = vec!["machine".to_string(), "learning".to_string()];
        assert_eq!(join_phrase(&w, false), "machine learning");
        assert_eq!(join_phrase(&w, true), "machinelearning");
        assert!(is_cjk_char('学'));
        assert!(!is_cjk_char('a'));
    }

    #[test]
    fn standalone_needs_word_boundaries() {
        let text = "concatenate the cat";
        assert!(!is_standalone(text, 3..6));
        assert!(is_standalone(text, 16..19));
        assert!(!is_standalone("ref 13", 5..6));
        assert!(is_standalone("ref 13", 4..6));
        assert!(is_standalone("(13)", 1..3));
        assert!(!is_standalone("bleue", 0..4));
        assert!(!is_standalone("x", 0..0));
    }

    #[test]
    fn cjk_characters_are_always_standalone() {
        let text = "機械学習のUSBモデル";
        assert!(is_standalone(text, 0.."機械".len()));
        let usb = text.find("USB").unwrap();
        assert!(is_standalone(text, usb..usb + 3));
        assert!(!is_standalone(text, usb..usb + 2));
    }
}
