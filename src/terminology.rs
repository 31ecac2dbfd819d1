use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::config::GlossaryConfig;
use crate::error::{LookupError, LookupResult};
use crate::ir::Match;
use crate::language::{same_language, Language};
use crate::markup::RichText;
use crate::quality::{LevenshteinSimilarity, SimilarityScorer};
use crate::remote::RemoteGlossary;
use crate::sentinels::escape_attr;

/// Ranked term retrieval. Implementations must be safe for concurrent reads.
pub trait TerminologyLookup: Send + Sync {
    /// Hits for `term`, best first. `min_similarity` is 0..=100.
    fn lookup(
        &self,
        term: &str,
        src_lang: &str,
        tgt_lang: &str,
        min_similarity: u8,
        case_sensitive: bool,
    ) -> LookupResult<Vec<Match>>;

    /// Glossary display name, recorded as the origin of discovered terms.
    fn name(&self) -> &str;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TermEntry {
    /// `(language, text)` pairs, one per language variant.
    pub variants: Vec<(String, String)>,
}

impl TermEntry {
    #[must_use]
    pub fn pair(src_lang: &str, source: &str, tgt_lang: &str, target: &str) -> Self {
        Self {
            variants: vec![
                (src_lang.to_string(), source.to_string()),
                (tgt_lang.to_string(), target.to_string()),
            ],
        }
    }

    #[must_use]
    pub fn text_for(&self, lang: &str) -> Option<&str> {
        self.variants
            .iter()
            .find(|(l, _)| same_language(lang, l) || same_language(l, lang))
            .map(|(_, t)| t.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Backing {
    Memory,
    Tmx(PathBuf),
    Tsv {
        path: PathBuf,
        src_lang: String,
        tgt_lang: String,
    },
}

/// Embedded glossary held in memory, optionally backed by a TMX or
/// tab-separated file.
#[derive(Debug)]
pub struct LocalGlossary {
    name: String,
    entries: RwLock<Vec<TermEntry>>,
    backing: Backing,
}

impl LocalGlossary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(Vec::new()),
            backing: Backing::Memory,
        }
    }

    pub fn with_entries(name: impl Into<String>, entries: Vec<TermEntry>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(entries),
            backing: Backing::Memory,
        }
    }

    /// Loads a TMX file, or a TSV file (`source<TAB>target`) whose columns
    /// are in `tsv_langs`.
    pub fn open(
        name: impl Into<String>,
        path: &Path,
        tsv_langs: (&str, &str),
    ) -> LookupResult<Self> {
        let text = read_text(path)?;
        let name = name.into();
        if text.contains("<tmx") {
            let entries = parse_tmx(&text)?;
            log::debug!("glossary {name}: {} TMX entries from {}", entries.len(), path.display());
            return Ok(Self {
                name,
                entries: RwLock::new(entries),
                backing: Backing::Tmx(path.to_path_buf()),
            });
        }
        if text.trim_start().starts_with('<') {
            return Err(LookupError::Decode(format!(
                "{}: only TMX or tab-separated glossaries are supported",
                path.display()
            )));
        }
        let (src_lang, tgt_lang) = tsv_langs;
        if src_lang.trim().is_empty() || tgt_lang.trim().is_empty() {
            return Err(LookupError::Decode(format!(
                "{}: a tab-separated glossary needs src_lang and tgt_lang",
                path.display()
            )));
        }
        let entries = parse_tsv(&text, src_lang, tgt_lang);
        log::debug!("glossary {name}: {} TSV entries from {}", entries.len(), path.display());
        Ok(Self {
            name,
            entries: RwLock::new(entries),
            backing: Backing::Tsv {
                path: path.to_path_buf(),
                src_lang: src_lang.to_string(),
                tgt_lang: tgt_lang.to_string(),
            },
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds a correspondence and persists it to the backing file, if any.
    pub fn add_term(
        &self,
        source: &str,
        target: &str,
        src_lang: &str,
        tgt_lang: &str,
    ) -> LookupResult<()> {
        let source = source.trim();
        let target = target.trim();
        if source.is_empty() || target.is_empty() {
            return Err(LookupError::Decode("term text must not be empty".to_string()));
        }
        let entry = TermEntry::pair(src_lang, source, tgt_lang, target);
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match &self.backing {
            Backing::Memory => {}
            Backing::Tmx(path) => {
                entries.push(entry);
                if let Err(e) = std::fs::write(path, render_tmx(&entries)) {
                    entries.pop();
                    return Err(e.into());
                }
                return Ok(());
            }
            Backing::Tsv {
                path,
                src_lang: file_src,
                tgt_lang: file_tgt,
            } => {
                if !same_language(file_src, src_lang) || !same_language(file_tgt, tgt_lang) {
                    return Err(LookupError::Decode(format!(
                        "{} holds {file_src} -> {file_tgt} terms only",
                        path.display()
                    )));
                }
                let mut file = std::fs::OpenOptions::new().append(true).open(path)?;
                writeln!(file, "{source}\t{target}")?;
            }
        }
        entries.push(entry);
        Ok(())
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, Vec<TermEntry>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TerminologyLookup for LocalGlossary {
    fn lookup(
        &self,
        term: &str,
        src_lang: &str,
        tgt_lang: &str,
        min_similarity: u8,
        case_sensitive: bool,
    ) -> LookupResult<Vec<Match>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        let wanted = if case_sensitive {
            term.to_string()
        } else {
            term.to_lowercase()
        };

        let entries = self.read_entries();
        let mut hits: Vec<(u8, Match)> = Vec::new();
        for entry in entries.iter() {
            let (Some(src), Some(tgt)) = (entry.text_for(src_lang), entry.text_for(tgt_lang))
            else {
                continue;
            };
            let candidate = if case_sensitive {
                src.to_string()
            } else {
                src.to_lowercase()
            };
            let score = if candidate == wanted {
                100
            } else if min_similarity >= 100 {
                continue;
            } else {
                LevenshteinSimilarity.score(&wanted, &candidate)
            };
            if score < min_similarity {
                continue;
            }
            hits.push((
                score,
                Match::new(
                    RichText::plain(src),
                    RichText::plain(tgt),
                    u32::from(score),
                    self.name.clone(),
                    BTreeMap::new(),
                ),
            ));
        }
        hits.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(hits.into_iter().map(|(_, m)| m).collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// The two kinds of glossary store, chosen by configuration.
#[derive(Debug)]
pub enum GlossaryStore {
    Local(LocalGlossary),
    Remote(RemoteGlossary),
}

/// Shared handle to one open glossary. Once closed, every lookup through any
/// remaining handle fails with [`LookupError::Closed`].
#[derive(Debug)]
pub struct GlossaryEngine {
    store: GlossaryStore,
    closed: AtomicBool,
}

impl From<LocalGlossary> for GlossaryEngine {
    fn from(g: LocalGlossary) -> Self {
        Self::new(GlossaryStore::Local(g))
    }
}

impl From<RemoteGlossary> for GlossaryEngine {
    fn from(g: RemoteGlossary) -> Self {
        Self::new(GlossaryStore::Remote(g))
    }
}

impl GlossaryEngine {
    pub fn new(store: GlossaryStore) -> Self {
        Self {
            store,
            closed: AtomicBool::new(false),
        }
    }

    /// Builds the engine described by `cfg`. Relative local paths resolve
    /// against `base_dir`.
    pub fn from_config(id: &str, cfg: &GlossaryConfig, base_dir: &Path) -> LookupResult<Self> {
        match cfg {
            GlossaryConfig::Local {
                path,
                src_lang,
                tgt_lang,
                ..
            } => {
                let path = if path.is_relative() {
                    base_dir.join(path)
                } else {
                    path.clone()
                };
                let glossary = LocalGlossary::open(
                    cfg.display_name(id),
                    &path,
                    (src_lang.as_str(), tgt_lang.as_str()),
                )?;
                Ok(glossary.into())
            }
            GlossaryConfig::Remote {
                server,
                user,
                password,
                timeout_secs,
                ..
            } => Ok(RemoteGlossary::connect(
                cfg.display_name(id),
                id,
                server,
                user,
                password,
                *timeout_secs,
            )?
            .into()),
        }
    }

    /// The local store, for editing. Fails once the engine is closed.
    pub fn as_local(&self) -> LookupResult<Option<&LocalGlossary>> {
        self.ensure_open()?;
        Ok(match &self.store {
            GlossaryStore::Local(g) => Some(g),
            GlossaryStore::Remote(_) => None,
        })
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> LookupResult<()> {
        if self.is_closed() {
            return Err(LookupError::Closed(self.name().to_string()));
        }
        Ok(())
    }
}

impl TerminologyLookup for GlossaryEngine {
    fn lookup(
        &self,
        term: &str,
        src_lang: &str,
        tgt_lang: &str,
        min_similarity: u8,
        case_sensitive: bool,
    ) -> LookupResult<Vec<Match>> {
        self.ensure_open()?;
        match &self.store {
            GlossaryStore::Local(g) => g.lookup(term, src_lang, tgt_lang, min_similarity, case_sensitive),
            GlossaryStore::Remote(g) => g.lookup(term, src_lang, tgt_lang, min_similarity, case_sensitive),
        }
    }

    fn name(&self) -> &str {
        match &self.store {
            GlossaryStore::Local(g) => g.name(),
            GlossaryStore::Remote(g) => g.name(),
        }
    }
}

/// Interactive glossary search: any similarity threshold, either case mode.
pub fn search_terms(
    engine: &dyn TerminologyLookup,
    text: &str,
    src_lang: &str,
    tgt_lang: &str,
    similarity: u8,
    case_sensitive: bool,
) -> LookupResult<Vec<Match>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let hits = engine.lookup(text, src_lang, tgt_lang, similarity.min(100), case_sensitive)?;
    log::debug!("{}: {} hit(s) for {text:?} at {similarity}%", engine.name(), hits.len());
    Ok(hits)
}

/// Plain-text table of glossary hits. Right-to-left columns are flagged.
#[must_use]
pub fn render_search_report(hits: &[Match], src_lang: &str, tgt_lang: &str) -> String {
    let describe = |code: &str| -> (String, bool) {
        Language::lookup(code)
            .map(|l| (l.description, l.bidi))
            .unwrap_or_else(|_| (code.to_string(), false))
    };
    let (src_name, src_rtl) = describe(src_lang);
    let (tgt_name, tgt_rtl) = describe(tgt_lang);
    let flag = |rtl: bool| if rtl { " [rtl]" } else { "" };

    let mut out = String::new();
    out.push_str(&format!(
        "{src_name}{}\t{tgt_name}{}\tquality\n",
        flag(src_rtl),
        flag(tgt_rtl)
    ));
    for m in hits {
        out.push_str(&m.source().flatten());
        out.push('\t');
        out.push_str(&m.target().flatten());
        out.push('\t');
        out.push_str(&m.quality().to_string());
        out.push('\n');
    }
    out
}

fn read_text(path: &Path) -> LookupResult<String> {
    let bytes = std::fs::read(path)?;
    let (encoding, bom_len) =
        encoding_rs::Encoding::for_bom(&bytes).unwrap_or((encoding_rs::UTF_8, 0));
    let (text, _, had_errors) = encoding.decode(&bytes[bom_len..]);
    if had_errors {
        return Err(LookupError::Decode(format!(
            "{}: invalid {} data",
            path.display(),
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

fn parse_tsv(text: &str, src_lang: &str, tgt_lang: &str) -> Vec<TermEntry> {
    text.lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
        .filter_map(|l| {
            let (src, tgt) = l.split_once('\t')?;
            let (src, tgt) = (src.trim(), tgt.trim());
            if src.is_empty() || tgt.is_empty() {
                return None;
            }
            Some(TermEntry::pair(src_lang, src, tgt_lang, tgt))
        })
        .collect()
}

fn parse_tmx(text: &str) -> LookupResult<Vec<TermEntry>> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);

    let mut entries = Vec::new();
    let mut variants: Vec<(String, String)> = Vec::new();
    let mut lang: Option<String> = None;
    let mut seg: Option<String> = None;
    // Depth inside inline code elements of a <seg>.
    let mut code_depth = 0usize;

    loop {
        let ev = reader
            .read_event()
            .map_err(|e| LookupError::Decode(format!("TMX: {e}")))?;
        match ev {
            Event::Eof => break,
            Event::Start(s) => match s.name().as_ref() {
                b"tu" => variants.clear(),
                b"tuv" => {
                    lang = None;
                    for a in s.attributes().flatten() {
                        if matches!(a.key.as_ref(), b"xml:lang" | b"lang") {
                            lang = Some(String::from_utf8_lossy(&a.value).into_owned());
                        }
                    }
                }
                b"seg" => seg = Some(String::new()),
                b"ph" | b"bpt" | b"ept" | b"it" if seg.is_some() => code_depth += 1,
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"tu" => {
                    if variants.len() >= 2 {
                        entries.push(TermEntry {
                            variants: std::mem::take(&mut variants),
                        });
                    }
                    variants.clear();
                }
                b"seg" => {
                    if let (Some(l), Some(text)) = (lang.clone(), seg.take()) {
                        let text = text.trim().to_string();
                        if !text.is_empty() {
                            variants.push((l, text));
                        }
                    }
                    code_depth = 0;
                }
                b"ph" | b"bpt" | b"ept" | b"it" if seg.is_some() => {
                    code_depth = code_depth.saturating_sub(1);
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some(buf) = seg.as_mut() {
                    if code_depth == 0 {
                        let txt = t
                            .unescape()
                            .map_err(|e| LookupError::Decode(format!("TMX: {e}")))?;
                        buf.push_str(&txt);
                    }
                }
            }
            Event::CData(t) => {
                if let Some(buf) = seg.as_mut() {
                    if code_depth == 0 {
                        buf.push_str(&String::from_utf8_lossy(&t.into_inner()));
                    }
                }
            }
            _ => {}
        }
    }
    Ok(entries)
}

fn render_tmx(entries: &[TermEntry]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<tmx version=\"1.4\">\n");
    out.push_str("<header creationtool=\"tm-assemble\" creationtoolversion=\"");
    out.push_str(env!("CARGO_PKG_VERSION"));
    out.push_str("\" segtype=\"phrase\" o-tmf=\"unknown\" adminlang=\"en\" srclang=\"*all*\" datatype=\"plaintext\"/>\n");
    out.push_str("<body>\n");
    for entry in entries {
        out.push_str("<tu>\n");
        for (lang, text) in &entry.variants {
            out.push_str(&format!(
                "<tuv xml:lang=\"{}\"><seg>{}</seg></tuv>\n",
                escape_attr(lang),
                escape_attr(text)
            ));
        }
        out.push_str("</tu>\n");
    }
    out.push_str("</body>\n</tmx>\n");
    out
}
