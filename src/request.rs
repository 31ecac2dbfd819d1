//! Batch request/report files for the `assemble` command.

use std::path::Path;

use anyhow::Context;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::assembler::MatchAssembler;
use crate::ir::Match;
use crate::progress::{ConsoleProgress, SegmentOutcome};
use crate::terminology::TerminologyLookup;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyRequest {
    pub src_lang: String,
    pub tgt_lang: String,
    /// Registry id of the glossary; the command line may override it.
    #[serde(default)]
    pub glossary: Option<String>,
    #[serde(default)]
    pub segments: Vec<SegmentRequest>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SegmentRequest {
    pub id: String,
    pub text: String,
    /// Fuzzy candidates, in retrieval order.
    #[serde(default)]
    pub matches: Vec<Match>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct AssemblyReport {
    pub results: Vec<SegmentResult>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SegmentResult {
    pub id: String,
    #[serde(rename = "match")]
    pub best: Option<Match>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AssemblyReport {
    #[must_use]
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_some()).count()
    }

    #[must_use]
    pub fn assembled(&self) -> usize {
        self.results.iter().filter(|r| r.best.is_some()).count()
    }
}

pub fn read_request(path: &Path) -> anyhow::Result<AssemblyRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read request: {}", path.display()))?;
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(&text);
    let req: AssemblyRequest = serde_json::from_str(text)
        .with_context(|| format!("parse request json: {}", path.display()))?;
    Ok(req)
}

/// Assembles every segment in parallel. A failing segment is reported in
/// its own result and does not affect the others. Results keep request order.
pub fn assemble_all(
    assembler: &MatchAssembler,
    request: &AssemblyRequest,
    glossary: &dyn TerminologyLookup,
    progress: &ConsoleProgress,
) -> AssemblyReport {
    progress.begin(request.segments.len());
    let results = request
        .segments
        .par_iter()
        .map(|seg| {
            let outcome = assembler.assemble(
                &seg.text,
                &seg.matches,
                glossary,
                &request.src_lang,
                &request.tgt_lang,
            );
            let kind = match &outcome {
                Ok(Some(_)) => SegmentOutcome::Assembled,
                Ok(None) => SegmentOutcome::NoMatch,
                Err(_) => SegmentOutcome::Failed,
            };
            progress.segment_done(seg.matches.len(), kind);
            match outcome {
                Ok(best) => SegmentResult {
                    id: seg.id.clone(),
                    best,
                    error: None,
                },
                Err(e) => {
                    log::warn!("segment {}: {e}", seg.id);
                    SegmentResult {
                        id: seg.id.clone(),
                        best: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .collect();
    AssemblyReport { results }
}

pub fn write_report(path: &Path, report: &AssemblyReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("serialize assembly report")?;
    std::fs::write(path, json).with_context(|| format!("write report: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminology::{LocalGlossary, TermEntry};

    const REQUEST: &str = r#"{
        "srcLang": "en",
        "tgtLang": "fr",
        "segments": [
            {"id": "s1", "text": "Delete 5 files",
             "matches": [{"source": "Delete 3 files", "target": "Supprimer 3 fichiers", "quality": 92, "origin": "tm"}]},
            {"id": "s2", "text": "Open the door"},
            {"id": "s3", "text": "Nothing here"}
        ]
    }"#;

    #[test]
    fn reads_request_with_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("req.json");
        std::fs::write(&path, format!("\u{FEFF}{REQUEST}")).unwrap();
        let req = read_request(&path).unwrap();
        assert_eq!(req.segments.len(), 3);
        assert!(req.glossary.is_none());
        assert_eq!(req.segments[0].matches[0].quality(), 92);
    }

    #[test]
    fn assembles_in_request_order() {
        let req: AssemblyRequest = serde_json::from_str(REQUEST).unwrap();
        let g = LocalGlossary::with_entries("G", vec![TermEntry::pair("en", "door", "fr", "porte")]);
        let a = MatchAssembler::default().with_creation_date("20260101T000000Z");
        let progress = ConsoleProgress::new(false);
        let report = assemble_all(&a, &req, &g, &progress);
        assert_eq!(progress.tally().assembled, report.assembled());
        assert_eq!(progress.tally().candidates, 1);

        let ids: Vec<&str> = report.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2", "s3"]);
        assert_eq!(report.assembled(), 2);
        assert_eq!(report.failures(), 0);
        assert_eq!(report.results[1].best.as_ref().unwrap().quality(), 0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["results"][0]["match"]["target"], "Supprimer <mrk type=\"term\" id=\"mrk1\" value=\"auto-translation\">5</mrk> fichiers");
        assert!(json["results"][2]["match"].is_null());
        assert!(json["results"][2].get("error").is_none());
    }

    #[test]
    fn segment_errors_are_isolated() {
        let mut req: AssemblyRequest = serde_json::from_str(REQUEST).unwrap();
        req.src_lang = "xx".to_string();
        let a = MatchAssembler::default();
        let report = assemble_all(&a, &req, &LocalGlossary::new("G"), &ConsoleProgress::new(false));
        // s1 splices without needing the language; the others reach the fallback
        assert!(report.results[0].best.is_some());
        assert_eq!(report.failures(), 2);
        assert!(report.results[1].error.as_deref().unwrap().contains("xx"));
    }
}
