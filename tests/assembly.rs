use std::collections::BTreeMap;

use match_assembler::config::{config_dir, load_config};
use match_assembler::ir::{PROP_CREATION_TOOL_VERSION, ORIGIN_AUTO};
use match_assembler::progress::ConsoleProgress;
use match_assembler::request::{assemble_all, read_request, write_report};
use match_assembler::sentinels::{guard, unguard, AMP_GUARD, LT_GUARD};
use match_assembler::terminology::TermEntry;
use match_assembler::{EngineRegistry, LocalGlossary, Match, MatchAssembler, RichText};
use proptest::prelude::*;

fn tm(source: &str, target: &str, quality: u32) -> Match {
    Match::new(
        RichText::plain(source),
        RichText::plain(target),
        quality,
        "tm",
        BTreeMap::new(),
    )
}

fn glossary(pairs: &[(&str, &str)]) -> LocalGlossary {
    LocalGlossary::with_entries(
        "Terms",
        pairs
            .iter()
            .map(|(s, t)| TermEntry::pair("en", s, "fr", t))
            .collect(),
    )
}

#[test]
fn delete_files_end_to_end() {
    let out = MatchAssembler::default()
        .assemble(
            "Delete 5 files",
            &[tm("Delete 3 files", "Supprimer 3 fichiers", 80)],
            &glossary(&[]),
            "en",
            "fr",
        )
        .expect("assemble")
        .expect("a match");
    assert_eq!(out.target().flatten(), "Supprimer 5 fichiers");
    assert!(out.quality() >= 80);
    assert_eq!(out.origin(), ORIGIN_AUTO);
    assert_eq!(
        out.properties()[PROP_CREATION_TOOL_VERSION],
        env!("CARGO_PKG_VERSION")
    );
    let marker = &out.target().term_markers()[0];
    assert_eq!(marker.attr("value"), Some("auto-translation"));
    assert_eq!(marker.text(), "5");
}

#[test]
fn asymmetric_candidates_are_never_returned() {
    let candidates = [
        tm("Delete the 3 files", "Supprimer les 3 fichiers", 75),
        tm("Delete 3 old files", "Supprimer 3 anciens fichiers", 75),
    ];
    let out = MatchAssembler::default()
        .assemble("Delete 5 files", &candidates, &glossary(&[]), "en", "fr")
        .expect("assemble");
    assert!(out.is_none());
}

#[test]
fn fallback_substitutes_the_longest_phrase() {
    let g = glossary(&[("machine", "machine"), ("machine learning", "apprentissage automatique")]);
    let out = MatchAssembler::default()
        .assemble("machine learning model", &[], &g, "en", "fr")
        .expect("assemble")
        .expect("a match");
    assert_eq!(out.quality(), 0);
    assert_eq!(out.target().flatten(), "apprentissage automatique model");
    let markers = out.target().term_markers();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].attr("value"), Some("machine learning"));
}

#[test]
fn fallback_never_lands_inside_a_longer_word() {
    let out = MatchAssembler::default()
        .assemble("concatenate the cat", &[], &glossary(&[("cat", "chat")]), "en", "fr")
        .expect("assemble")
        .expect("a match");
    assert_eq!(out.target().flatten(), "concatenate the chat");
    assert_eq!(
        out.target().to_markup(),
        "concatenate the <mrk type=\"term\" id=\"mrk1\" value=\"cat\">chat</mrk>"
    );
}

#[test]
fn fallback_handles_contiguous_scripts() {
    let g = LocalGlossary::with_entries(
        "Terms",
        vec![TermEntry::pair("ja", "機械学習", "en", "machine learning")],
    );
    let out = MatchAssembler::default()
        .assemble("機械学習のモデル", &[], &g, "ja", "en")
        .expect("assemble")
        .expect("a match");
    assert_eq!(out.target().flatten(), "machine learningのモデル");
}

#[test]
fn config_registry_and_batch_work_together() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("terms.tsv"), "blue\tbleu\nred\trouge\n").expect("tsv");
    let cfg_path = dir.path().join("tm-assemble.toml");
    std::fs::write(
        &cfg_path,
        r#"
[assembler]
creation_tool = "batch-test"
first_marker_id = 10

[glossaries.colors]
type = "local"
path = "terms.tsv"
src_lang = "en"
tgt_lang = "fr"
"#,
    )
    .expect("config");
    let req_path = dir.path().join("req.json");
    std::fs::write(
        &req_path,
        r#"{"srcLang":"en","tgtLang":"fr","glossary":"colors","segments":[
            {"id":"1","text":"A red car","matches":[{"source":"A blue car","target":"Une voiture bleu","quality":70}]},
            {"id":"2","text":"Something else"}
        ]}"#,
    )
    .expect("request");

    let cfg = load_config(&cfg_path).expect("load");
    let mut registry = EngineRegistry::from_config(&cfg, config_dir(&cfg_path));
    let req = read_request(&req_path).expect("read");
    let engine = registry.open(req.glossary.as_deref().expect("glossary")).expect("open");

    let assembler = MatchAssembler::new(cfg.assembler_settings()).with_creation_date("20260101T000000Z");
    let report = assemble_all(&assembler, &req, engine.as_ref(), &ConsoleProgress::new(false));
    assert_eq!(report.assembled(), 1);

    let best = report.results[0].best.as_ref().expect("segment 1");
    assert_eq!(best.target().flatten(), "Une voiture rouge");
    assert_eq!(best.properties()["creationtool"], "batch-test");
    assert_eq!(best.target().term_markers()[0].attr("id"), Some("mrk10"));

    let out_path = dir.path().join("out.json");
    write_report(&out_path, &report).expect("write");
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out_path).expect("read back")).expect("json");
    assert_eq!(json["results"][0]["id"], "1");
    assert!(json["results"][1]["match"].is_null());

    registry.close("colors").expect("close");
    assert_eq!(registry.open_count("colors"), 0);
}

proptest! {
    #[test]
    fn guard_round_trips(s in "[^\u{E0A0}\u{E0A1}]*") {
        let g = guard(&s);
        prop_assert!(!g.contains('<') && !g.contains('&'));
        prop_assert_eq!(unguard(&g), s);
    }

    #[test]
    fn query_numbers_win(a in 0u32..100_000, b in 0u32..100_000) {
        prop_assume!(a != b);
        let query = format!("Delete {a} files");
        let cand = tm(&format!("Delete {b} files"), &format!("Supprimer {b} fichiers"), 80);
        let out = MatchAssembler::default()
            .with_creation_date("20260101T000000Z")
            .assemble(&query, &[cand], &glossary(&[]), "en", "fr")
            .expect("assemble")
            .expect("a match");
        prop_assert_eq!(out.target().flatten(), format!("Supprimer {a} fichiers"));
        prop_assert_eq!(out.quality(), 100);
    }

    #[test]
    fn assembly_is_deterministic(n in 0u32..1000, color in prop::sample::select(vec!["red", "blue", "green"])) {
        let g = glossary(&[("red", "rouge"), ("blue", "bleu"), ("green", "vert")]);
        let query = format!("Paint {n} {color} walls");
        let candidates = [tm("Paint 2 blue walls", "Peindre 2 murs bleu", 70)];
        let a = MatchAssembler::default().with_creation_date("20260101T000000Z");
        let first = a.assemble(&query, &candidates, &g, "en", "fr").expect("first");
        let second = a.assemble(&query, &candidates, &g, "en", "fr").expect("second");
        prop_assert_eq!(first, second);
    }
}

#[test]
fn sentinels_are_private_use_characters() {
    assert!(('\u{E000}'..='\u{F8FF}').contains(&LT_GUARD));
    assert!(('\u{E000}'..='\u{F8FF}').contains(&AMP_GUARD));
}
