//! Language reference data: display names plus the two script properties the
//! assembler and renderers care about.

use serde::Serialize;

use crate::error::LanguageError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: String,
    pub description: String,
    #[serde(rename = "isCJK")]
    pub cjk: bool,
    #[serde(rename = "isBiDi")]
    pub bidi: bool,
}

struct Known {
    code: &'static str,
    description: &'static str,
    cjk: bool,
    bidi: bool,
}

const fn lang(code: &'static str, description: &'static str) -> Known {
    Known {
        code,
        description,
        cjk: false,
        bidi: false,
    }
}

const fn cjk(code: &'static str, description: &'static str) -> Known {
    Known {
        code,
        description,
        cjk: true,
        bidi: false,
    }
}

const fn rtl(code: &'static str, description: &'static str) -> Known {
    Known {
        code,
        description,
        cjk: false,
        bidi: true,
    }
}

static KNOWN: &[Known] = &[
    rtl("ar", "Arabic"),
    lang("bg", "Bulgarian"),
    lang("ca", "Catalan"),
    lang("cs", "Czech"),
    lang("da", "Danish"),
    lang("de", "German"),
    lang("el", "Greek"),
    lang("en", "English"),
    lang("en-GB", "English (United Kingdom)"),
    lang("en-US", "English (United States)"),
    lang("es", "Spanish"),
    lang("et", "Estonian"),
    rtl("fa", "Persian"),
    lang("fi", "Finnish"),
    lang("fr", "French"),
    lang("fr-CA", "French (Canada)"),
    rtl("he", "Hebrew"),
    lang("hi", "Hindi"),
    lang("hr", "Croatian"),
    lang("hu", "Hungarian"),
    lang("id", "Indonesian"),
    lang("it", "Italian"),
    cjk("ja", "Japanese"),
    cjk("ko", "Korean"),
    lang("lt", "Lithuanian"),
    lang("lv", "Latvian"),
    lang("nb", "Norwegian Bokmål"),
    lang("nl", "Dutch"),
    lang("pl", "Polish"),
    lang("pt", "Portuguese"),
    lang("pt-BR", "Portuguese (Brazil)"),
    lang("ro", "Romanian"),
    lang("ru", "Russian"),
    lang("sk", "Slovak"),
    lang("sl", "Slovenian"),
    lang("sr", "Serbian"),
    lang("sv", "Swedish"),
    lang("th", "Thai"),
    lang("tr", "Turkish"),
    lang("uk", "Ukrainian"),
    rtl("ur", "Urdu"),
    lang("vi", "Vietnamese"),
    rtl("yi", "Yiddish"),
    cjk("zh", "Chinese"),
    cjk("zh-CN", "Chinese (China)"),
    cjk("zh-HK", "Chinese (Hong Kong)"),
    cjk("zh-TW", "Chinese (Taiwan)"),
];

impl Language {
    /// Resolves a BCP 47 style code. Unlisted regional variants inherit the
    /// properties of their primary language.
    pub fn lookup(code: &str) -> Result<Self, LanguageError> {
        let normalized = normalize_code(code);
        if let Some(k) = find(&normalized) {
            return Ok(Self::from_known(k, k.code.to_string(), k.description.to_string()));
        }
        let primary = normalized.split('-').next().unwrap_or_default();
        if let Some(k) = find(primary) {
            let rest = normalized[primary.len()..].trim_start_matches('-');
            return Ok(Self::from_known(
                k,
                normalized.clone(),
                format!("{} ({rest})", k.description),
            ));
        }
        Err(LanguageError::Unknown {
            code: code.to_string(),
        })
    }

    fn from_known(k: &Known, code: String, description: String) -> Self {
        Self {
            code,
            description,
            cjk: k.cjk,
            bidi: k.bidi,
        }
    }

    #[must_use]
    pub fn is_cjk(&self) -> bool {
        self.cjk
    }

    #[must_use]
    pub fn is_bidi(&self) -> bool {
        self.bidi
    }
}

fn find(code: &str) -> Option<&'static Known> {
    KNOWN.iter().find(|k| k.code.eq_ignore_ascii_case(code))
}

/// `EN_us` → `en-US`; script subtags keep title case (`zh-hant` → `zh-Hant`).
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim()
        .replace('_', "-")
        .split('-')
        .enumerate()
        .map(|(i, part)| match (i, part.len()) {
            (0, _) => part.to_ascii_lowercase(),
            (_, 2) => part.to_ascii_uppercase(),
            (_, 4) if part.is_ascii() => {
                let (head, tail) = part.split_at(1);
                head.to_ascii_uppercase() + &tail.to_ascii_lowercase()
            }
            _ => part.to_ascii_lowercase(),
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Language tags compared case-insensitively; a bare primary tag matches any
/// of its regional variants.
#[must_use]
pub fn same_language(query: &str, candidate: &str) -> bool {
    let q = normalize_code(query);
    let c = normalize_code(candidate);
    if q == c {
        return true;
    }
    if !q.contains('-') {
        return c.split('-').next() == Some(q.as_str());
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_known_codes() {
        let ja = Language::lookup("ja").unwrap();
        assert!(ja.is_cjk());
        assert!(!ja.is_bidi());
        assert_eq!(ja.description, "Japanese");

        let he = Language::lookup("HE").unwrap();
        assert!(he.is_bidi());
        assert_eq!(he.code, "he");
    }

    #[test]
    fn regional_variants_fall_back_to_primary() {
        let zh = Language::lookup("zh_SG").unwrap();
        assert_eq!(zh.code, "zh-SG");
        assert!(zh.is_cjk());
        assert_eq!(zh.description, "Chinese (SG)");

        let en = Language::lookup("en-us").unwrap();
        assert_eq!(en.description, "English (United States)");
    }

    #[test]
    fn unknown_codes_are_errors() {
        assert_eq!(
            Language::lookup("xx"),
            Err(LanguageError::Unknown {
                code: "xx".to_string()
            })
        );
        assert!(Language::lookup("").is_err());
    }

    #[test]
    fn normalizes_codes() {
        assert_eq!(normalize_code("EN_us"), "en-US");
        assert_eq!(normalize_code("zh-hant-tw"), "zh-Hant-TW");
    }

    #[test]
    fn compares_language_tags() {
        assert!(same_language("en", "en-US"));
        assert!(same_language("en-us", "EN-US"));
        assert!(!same_language("en-US", "en-GB"));
        assert!(!same_language("en-US", "en"));
        assert!(!same_language("fr", "en"));
    }
}
