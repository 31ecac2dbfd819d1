use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::markup::RichText;

/// Origin label of every match produced by the assembler.
pub const ORIGIN_AUTO: &str = "Auto";

pub const PROP_CREATION_DATE: &str = "creationdate";
pub const PROP_CREATION_TOOL: &str = "creationtool";
pub const PROP_CREATION_TOOL_VERSION: &str = "creationtoolversion";

/// A retrieved or synthesized translation pair. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    source: RichText,
    target: RichText,
    #[serde(default, deserialize_with = "de_quality")]
    quality: u8,
    #[serde(default)]
    origin: String,
    #[serde(default)]
    properties: BTreeMap<String, String>,
}

impl Match {
    /// `quality` is clamped to 0..=100.
    pub fn new(
        source: RichText,
        target: RichText,
        quality: u32,
        origin: impl Into<String>,
        properties: BTreeMap<String, String>,
    ) -> Self {
        Self {
            source,
            target,
            quality: clamp_quality(quality),
            origin: origin.into(),
            properties,
        }
    }

    #[must_use]
    pub fn source(&self) -> &RichText {
        &self.source
    }

    #[must_use]
    pub fn target(&self) -> &RichText {
        &self.target
    }

    #[must_use]
    pub fn quality(&self) -> u8 {
        self.quality
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    #[must_use]
    pub fn is_auto(&self) -> bool {
        self.origin == ORIGIN_AUTO
    }
}

fn clamp_quality(q: u32) -> u8 {
    q.min(100) as u8
}

fn de_quality<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    let raw = i64::deserialize(d)?;
    Ok(raw.clamp(0, 100) as u8)
}

/// Best match first.
pub fn by_quality_desc(a: &Match, b: &Match) -> Ordering {
    b.quality.cmp(&a.quality)
}

/// Stable: equal-quality matches keep their relative order.
pub fn rank_matches(matches: &mut [Match]) {
    matches.sort_by(by_quality_desc);
}

/// A glossary correspondence discovered while assembling word by word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Term {
    pub source: String,
    pub target: String,
    pub src_lang: String,
    pub tgt_lang: String,
    pub origin: String,
}

impl Term {
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.source.split_whitespace().count()
    }
}

/// Substitution priority: longer source phrase (in characters) first, then
/// more words, then source text ascending. Used with a stable sort, so terms
/// that are still equal keep discovery order.
pub fn longest_first(a: &Term, b: &Term) -> Ordering {
    b.source
        .chars()
        .count()
        .cmp(&a.source.chars().count())
        .then_with(|| b.word_count().cmp(&a.word_count()))
        .then_with(|| a.source.cmp(&b.source))
}

/// Creation stamp attached to synthesized matches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Provenance {
    pub creation_date: String,
    pub creation_tool: String,
    pub creation_tool_version: String,
}

impl Provenance {
    #[must_use]
    pub fn to_properties(&self) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        props.insert(PROP_CREATION_DATE.to_string(), self.creation_date.clone());
        props.insert(PROP_CREATION_TOOL.to_string(), self.creation_tool.clone());
        props.insert(
            PROP_CREATION_TOOL_VERSION.to_string(),
            self.creation_tool_version.clone(),
        );
        props
    }
}

/// TMX `creationdate` format, e.g. `20261016T093000Z`.
#[must_use]
pub fn tmx_date(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}
