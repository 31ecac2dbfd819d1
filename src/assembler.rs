//! Match assembly: synthesizes a new translation candidate for a query from
//! fuzzy memory matches and glossary terms.
//!
//! For each distinct candidate, the differing spans between the query and the
//! candidate source are paired up. A numeric span is copied verbatim from the
//! query into both candidate sides. Any other span is resolved through the
//! glossary: the candidate's term is located in the candidate target and
//! swapped for the query's term. Every edit is recorded as a claim on the
//! untouched candidate text and applied once, then the result is re-parsed
//! and rescored against the query.
//!
//! When no candidate yields a splice, a target is built from glossary terms
//! alone (longest first) and returned with quality 0.

use std::collections::HashSet;
use std::ops::Range;

use chrono::Utc;

use crate::config::AssemblerSettings;
use crate::diff::{DiffSpans, DifferenceTagger, LcsDifferenceTagger};
use crate::error::{AssemblyResult, MarkupError};
use crate::ir::{longest_first, rank_matches, tmx_date, Match, Provenance, Term, ORIGIN_AUTO};
use crate::language::Language;
use crate::markup::RichText;
use crate::quality::{is_numeric, LevenshteinSimilarity, SimilarityScorer};
use crate::sentinels::{count_diffs, guard, term_marker, unguard, MarkerIds, AUTO_TRANSLATION};
use crate::splice::{standalone_positions, SpliceSet};
use crate::terminology::TerminologyLookup;
use crate::textutil::{join_phrase, SeparatorTokenizer, Tokenizer, TERM_SEPARATORS};

/// Guarded markup of one candidate after splicing, before re-parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spliced {
    pub source: String,
    pub target: String,
}

pub struct MatchAssembler {
    settings: AssemblerSettings,
    tagger: Box<dyn DifferenceTagger>,
    tokenizer: Box<dyn Tokenizer>,
    scorer: Box<dyn SimilarityScorer>,
    creation_date: Option<String>,
}

impl Default for MatchAssembler {
    fn default() -> Self {
        Self::new(AssemblerSettings::default())
    }
}

impl MatchAssembler {
    pub fn new(settings: AssemblerSettings) -> Self {
        Self {
            settings,
            tagger: Box::new(LcsDifferenceTagger),
            tokenizer: Box::new(SeparatorTokenizer),
            scorer: Box::new(LevenshteinSimilarity),
            creation_date: None,
        }
    }

    #[must_use]
    pub fn with_tagger(mut self, tagger: impl DifferenceTagger + 'static) -> Self {
        self.tagger = Box::new(tagger);
        self
    }

    #[must_use]
    pub fn with_tokenizer(mut self, tokenizer: impl Tokenizer + 'static) -> Self {
        self.tokenizer = Box::new(tokenizer);
        self
    }

    #[must_use]
    pub fn with_scorer(mut self, scorer: impl SimilarityScorer + 'static) -> Self {
        self.scorer = Box::new(scorer);
        self
    }

    /// Pins the `creationdate` property, e.g. for reproducible output.
    #[must_use]
    pub fn with_creation_date(mut self, date: impl Into<String>) -> Self {
        self.creation_date = Some(date.into());
        self
    }

    #[must_use]
    pub fn settings(&self) -> &AssemblerSettings {
        &self.settings
    }

    fn provenance(&self) -> Provenance {
        Provenance {
            creation_date: self
                .creation_date
                .clone()
                .unwrap_or_else(|| tmx_date(Utc::now())),
            creation_tool: self.settings.creation_tool.clone(),
            creation_tool_version: self.settings.creation_tool_version.clone(),
        }
    }

    /// Best synthesized match for `query`, or `None` when neither the
    /// candidates nor the glossary contribute anything.
    ///
    /// Glossary and language failures abort the call. Candidates whose
    /// rebuilt markup does not parse are dropped.
    pub fn assemble(
        &self,
        query: &str,
        candidates: &[Match],
        glossary: &dyn TerminologyLookup,
        src_lang: &str,
        tgt_lang: &str,
    ) -> AssemblyResult<Option<Match>> {
        let query = guard(query.trim());
        let provenance = self.provenance();
        let mut ids = MarkerIds::starting_at(self.settings.first_marker_id);

        let mut seen: HashSet<String> = HashSet::new();
        let mut spliced = Vec::new();
        for (idx, candidate) in candidates.iter().enumerate() {
            let source = guard(candidate.source().flatten().trim());
            if !seen.insert(source.clone()) {
                log::debug!("candidate {idx}: duplicate source, skipped");
                continue;
            }
            let target = guard(&candidate.target().flatten());
            if let Some(s) = self.splice_candidate(
                &query, &source, &target, glossary, src_lang, tgt_lang, &mut ids,
            )? {
                spliced.push(s);
            }
        }

        match self.best_rebuilt(&query, &spliced, &provenance) {
            Some(best) => Ok(Some(best)),
            None => self.assemble_from_terms(&query, glossary, src_lang, tgt_lang, &mut ids, &provenance),
        }
    }

    /// Rebuilds every spliced candidate and returns the best. Candidates
    /// whose markup does not parse back are dropped.
    fn best_rebuilt(&self, query: &str, spliced: &[Spliced], provenance: &Provenance) -> Option<Match> {
        let mut results = Vec::with_capacity(spliced.len());
        for (idx, s) in spliced.iter().enumerate() {
            match self.rebuild(query, s, provenance) {
                Ok(m) => results.push(m),
                Err(e) => log::warn!("spliced candidate {idx} dropped: {e}"),
            }
        }
        rank_matches(&mut results);
        results.into_iter().next()
    }

    /// Pairs the differing spans of `query` and `source` and splices each
    /// resolvable pair. `None` when nothing in the source changed.
    #[allow(clippy::too_many_arguments)]
    pub fn splice_candidate(
        &self,
        query: &str,
        source: &str,
        target: &str,
        glossary: &dyn TerminologyLookup,
        src_lang: &str,
        tgt_lang: &str,
        ids: &mut MarkerIds,
    ) -> AssemblyResult<Option<Spliced>> {
        let (tagged_query, tagged_source) = self.tagger.tag(query, source);
        let (n_query, n_source) = (count_diffs(&tagged_query), count_diffs(&tagged_source));
        if n_query != n_source {
            log::debug!("asymmetric difference ({n_query} vs {n_source} spans), candidate skipped");
            return Ok(None);
        }
        let spans = DiffSpans::from_tagged(&tagged_query, &tagged_source);

        let mut src_edits = SpliceSet::new();
        let mut tgt_edits = SpliceSet::new();
        for (q_span, c_span) in spans.a.iter().zip(spans.b.iter()) {
            let (Some(q_span), Some(c_span)) = (trim_range(query, q_span), trim_range(source, c_span))
            else {
                continue;
            };
            let q_diff = &query[q_span.clone()];
            let c_diff = &source[c_span.clone()];

            if is_numeric(q_diff) && is_numeric(c_diff) {
                let in_source = standalone_positions(source, c_diff);
                let in_target = standalone_positions(target, c_diff);
                let ([_], [t_pos]) = (in_source.as_slice(), in_target.as_slice()) else {
                    log::debug!("number {c_diff:?} is not unique in the candidate, left as is");
                    continue;
                };
                let t_span = *t_pos..*t_pos + c_diff.len();
                if src_edits.overlaps(c_span.start, c_span.end)
                    || tgt_edits.overlaps(t_span.start, t_span.end)
                {
                    continue;
                }
                let marker = term_marker(ids.next_id(), AUTO_TRANSLATION, q_diff);
                src_edits.claim(c_span.start, c_span.end, marker.clone());
                tgt_edits.claim(t_span.start, t_span.end, marker);
                continue;
            }

            let cand_hits = glossary.lookup(&unguard(c_diff), src_lang, tgt_lang, 100, true)?;
            let query_hits = glossary.lookup(&unguard(q_diff), src_lang, tgt_lang, 100, true)?;
            let (Some(cand_hit), Some(query_hit)) = (cand_hits.first(), query_hits.first()) else {
                continue;
            };

            let cand_term_target = guard(&cand_hit.target().flatten());
            let query_term_source = query_hit.source().flatten();
            let query_term_target = query_hit.target().flatten();
            if query_term_target.is_empty() || src_edits.overlaps(c_span.start, c_span.end) {
                continue;
            }
            let Some(t_pos) = tgt_edits.find_unclaimed(target, &cand_term_target) else {
                log::debug!("term {c_diff:?} not found in candidate target, left as is");
                continue;
            };
            let id = ids.next_id();
            src_edits.claim(
                c_span.start,
                c_span.end,
                term_marker(id, &query_term_target, q_diff),
            );
            tgt_edits.claim(
                t_pos,
                t_pos + cand_term_target.len(),
                term_marker(id, &query_term_source, &guard(&query_term_target)),
            );
        }

        if src_edits.is_empty() {
            return Ok(None);
        }
        Ok(Some(Spliced {
            source: src_edits.apply(source),
            target: tgt_edits.apply(target),
        }))
    }

    /// Parses spliced markup back into a scored `Auto` match.
    pub fn rebuild(
        &self,
        query: &str,
        spliced: &Spliced,
        provenance: &Provenance,
    ) -> Result<Match, MarkupError> {
        let source = RichText::parse(&spliced.source)?.unguarded();
        let target = RichText::parse(&spliced.target)?.unguarded();
        let quality = self.scorer.score(&unguard(query), &source.flatten());
        Ok(Match::new(
            source,
            target,
            u32::from(quality),
            ORIGIN_AUTO,
            provenance.to_properties(),
        ))
    }

    /// Glossary-only target: every word window of the query up to the
    /// configured length is looked up, and the hits are substituted longest
    /// first into free regions of the query.
    fn assemble_from_terms(
        &self,
        query: &str,
        glossary: &dyn TerminologyLookup,
        src_lang: &str,
        tgt_lang: &str,
        ids: &mut MarkerIds,
        provenance: &Provenance,
    ) -> AssemblyResult<Option<Match>> {
        let terms = self.discover_terms(query, glossary, src_lang, tgt_lang)?;
        if terms.is_empty() {
            return Ok(None);
        }

        let mut claims = SpliceSet::new();
        for term in &terms {
            let needle = guard(&term.source);
            let Some(pos) = claims.find_unclaimed(query, &needle) else {
                continue;
            };
            let marker = term_marker(ids.next_id(), &term.source, &guard(&term.target));
            claims.claim(pos, pos + needle.len(), marker);
        }
        if claims.is_empty() {
            return Ok(None);
        }

        let target = match RichText::parse(&claims.apply(query)) {
            Ok(t) => t.unguarded(),
            Err(e) => {
                log::warn!("glossary-only target dropped: {e}");
                return Ok(None);
            }
        };
        log::debug!("glossary-only target built from {} term(s)", claims.len());
        Ok(Some(Match::new(
            RichText::plain(unguard(query)),
            target,
            0,
            ORIGIN_AUTO,
            provenance.to_properties(),
        )))
    }

    /// Distinct glossary terms found in `query`, in substitution order.
    pub fn discover_terms(
        &self,
        query: &str,
        glossary: &dyn TerminologyLookup,
        src_lang: &str,
        tgt_lang: &str,
    ) -> AssemblyResult<Vec<Term>> {
        let contiguous = Language::lookup(src_lang)?.is_cjk();
        let words = self.tokenizer.words(query, TERM_SEPARATORS, contiguous);

        let mut tried: HashSet<String> = HashSet::new();
        let mut found: HashSet<String> = HashSet::new();
        let mut terms = Vec::new();
        for start in 0..words.len() {
            for len in 1..=self.settings.max_term_length {
                let end = start + len;
                if end > words.len() {
                    break;
                }
                let phrase = unguard(&join_phrase(&words[start..end], contiguous));
                if !tried.insert(phrase.clone()) {
                    continue;
                }
                let hits = glossary.lookup(&phrase, src_lang, tgt_lang, 100, true)?;
                let Some(hit) = hits.first() else {
                    continue;
                };
                let source = hit.source().flatten();
                if source.is_empty() || !found.insert(source.clone()) {
                    continue;
                }
                terms.push(Term {
                    source,
                    target: hit.target().flatten(),
                    src_lang: src_lang.to_string(),
                    tgt_lang: tgt_lang.to_string(),
                    origin: glossary.name().to_string(),
                });
            }
        }
        terms.sort_by(longest_first);
        Ok(terms)
    }
}

/// Shrinks `span` to exclude surrounding whitespace; `None` if nothing is left.
fn trim_range(text: &str, span: &Range<usize>) -> Option<Range<usize>> {
    let slice = &text[span.clone()];
    let lead = slice.len() - slice.trim_start().len();
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let start = span.start + lead;
    Some(start..start + trimmed.len())
}
