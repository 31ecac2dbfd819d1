//! Configured glossary engines, opened on demand and shared by reference
//! count. An engine stays open until every `open` has been matched by a
//! `close`.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{AppConfig, GlossaryConfig};
use crate::error::RegistryError;
use crate::terminology::{GlossaryEngine, TerminologyLookup};

struct OpenEngine {
    engine: Arc<GlossaryEngine>,
    count: usize,
}

/// `(id, display name, store type)` of one configured glossary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlossaryInfo {
    pub id: String,
    pub name: String,
    pub kind: &'static str,
    pub open: bool,
}

pub struct EngineRegistry {
    definitions: BTreeMap<String, GlossaryConfig>,
    base_dir: PathBuf,
    open: HashMap<String, OpenEngine>,
}

impl EngineRegistry {
    pub fn new(definitions: BTreeMap<String, GlossaryConfig>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            definitions,
            base_dir: base_dir.into(),
            open: HashMap::new(),
        }
    }

    pub fn from_config(cfg: &AppConfig, config_dir: impl Into<PathBuf>) -> Self {
        Self::new(cfg.glossaries.clone(), config_dir)
    }

    /// Configured glossaries, sorted by display name.
    #[must_use]
    pub fn list(&self) -> Vec<GlossaryInfo> {
        let mut out: Vec<GlossaryInfo> = self
            .definitions
            .iter()
            .map(|(id, cfg)| GlossaryInfo {
                id: id.clone(),
                name: cfg.display_name(id),
                kind: match cfg {
                    GlossaryConfig::Local { .. } => "local",
                    GlossaryConfig::Remote { .. } => "remote",
                },
                open: self.open.contains_key(id),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        out
    }

    pub fn open(&mut self, id: &str) -> Result<Arc<GlossaryEngine>, RegistryError> {
        if let Some(entry) = self.open.get_mut(id) {
            entry.count += 1;
            return Ok(Arc::clone(&entry.engine));
        }
        let cfg = self
            .definitions
            .get(id)
            .ok_or_else(|| RegistryError::Unknown(id.to_string()))?;
        let engine = GlossaryEngine::from_config(id, cfg, &self.base_dir).map_err(|source| {
            RegistryError::Open {
                id: id.to_string(),
                source,
            }
        })?;
        log::info!("opened glossary {id} ({})", engine.name());
        let engine = Arc::new(engine);
        self.open.insert(
            id.to_string(),
            OpenEngine {
                engine: Arc::clone(&engine),
                count: 1,
            },
        );
        Ok(engine)
    }

    pub fn get(&self, id: &str) -> Result<Arc<GlossaryEngine>, RegistryError> {
        match self.open.get(id) {
            Some(entry) => Ok(Arc::clone(&entry.engine)),
            None if self.definitions.contains_key(id) => Err(RegistryError::NotOpen(id.to_string())),
            None => Err(RegistryError::Unknown(id.to_string())),
        }
    }

    /// Drops one reference; the engine is released when none remain.
    pub fn close(&mut self, id: &str) -> Result<(), RegistryError> {
        let Some(entry) = self.open.get_mut(id) else {
            return Err(RegistryError::NotOpen(id.to_string()));
        };
        entry.count -= 1;
        if entry.count == 0 {
            entry.engine.close();
            self.open.remove(id);
            log::info!("closed glossary {id}");
        }
        Ok(())
    }

    pub fn close_all(&mut self) {
        for (id, entry) in self.open.drain() {
            entry.engine.close();
            log::debug!("closed glossary {id}");
        }
    }

    #[must_use]
    pub fn open_count(&self, id: &str) -> usize {
        self.open.get(id).map_or(0, |e| e.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupError;

    fn registry(dir: &std::path::Path) -> EngineRegistry {
        std::fs::write(dir.join("terms.tsv"), "file\tfichier\n").unwrap();
        let mut defs = BTreeMap::new();
        defs.insert(
            "main".to_string(),
            GlossaryConfig::Local {
                name: Some("Main".to_string()),
                path: PathBuf::from("terms.tsv"),
                src_lang: "en".to_string(),
                tgt_lang: "fr".to_string(),
            },
        );
        defs.insert(
            "missing".to_string(),
            GlossaryConfig::Local {
                name: None,
                path: PathBuf::from("nope.tmx"),
                src_lang: String::new(),
                tgt_lang: String::new(),
            },
        );
        EngineRegistry::new(defs, dir)
    }

    #[test]
    fn open_is_reference_counted() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry(dir.path());

        let a = reg.open("main").unwrap();
        let b = reg.open("main").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.open_count("main"), 2);
        assert_eq!(a.name(), "Main");
        assert_eq!(a.lookup("file", "en", "fr", 100, true).unwrap().len(), 1);

        reg.close("main").unwrap();
        assert!(reg.get("main").is_ok());
        reg.close("main").unwrap();
        assert_eq!(reg.open_count("main"), 0);
        assert!(matches!(reg.get("main"), Err(RegistryError::NotOpen(_))));
        assert!(matches!(reg.close("main"), Err(RegistryError::NotOpen(_))));
    }

    #[test]
    fn handles_outliving_the_last_close_are_closed() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry(dir.path());
        let held = reg.open("main").unwrap();
        reg.close("main").unwrap();
        assert!(held.is_closed());
        assert!(matches!(
            held.lookup("file", "en", "fr", 100, true),
            Err(LookupError::Closed(name)) if name == "Main"
        ));
        assert!(held.as_local().is_err());

        let reopened = reg.open("main").unwrap();
        assert!(!reopened.is_closed());
        assert_eq!(reopened.lookup("file", "en", "fr", 100, true).unwrap().len(), 1);
    }

    #[test]
    fn unknown_and_broken_glossaries() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry(dir.path());
        assert!(matches!(reg.open("other"), Err(RegistryError::Unknown(_))));
        assert!(matches!(reg.get("other"), Err(RegistryError::Unknown(_))));
        assert!(matches!(reg.open("missing"), Err(RegistryError::Open { .. })));
        assert_eq!(reg.open_count("missing"), 0);
    }

    #[test]
    fn lists_and_closes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry(dir.path());
        let held = reg.open("main").unwrap();
        let listed = reg.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "Main");
        assert!(listed[0].open);
        assert_eq!(listed[1].id, "missing");
        assert!(!listed[1].open);
        reg.close_all();
        assert_eq!(reg.open_count("main"), 0);
        assert!(held.is_closed());
    }
}
