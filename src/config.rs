use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILENAME: &str = "tm-assemble.toml";
pub const CONFIG_ENV_VAR: &str = "TM_ASSEMBLE_CONFIG";

pub const DEFAULT_MAX_TERM_LENGTH: usize = 5;
pub const DEFAULT_CREATION_TOOL: &str = "tm-assemble";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub assembler: AssemblerSection,
    #[serde(default)]
    pub glossaries: BTreeMap<String, GlossaryConfig>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AssemblerSection {
    /// Longest word window tried by the glossary-only fallback.
    #[serde(default)]
    pub max_term_length: Option<usize>,
    #[serde(default)]
    pub creation_tool: Option<String>,
    #[serde(default)]
    pub creation_tool_version: Option<String>,
    /// First numeric id handed to inline term markers in each assembly.
    #[serde(default)]
    pub first_marker_id: Option<u32>,
}

/// One configured glossary store, keyed by id in `[glossaries.<id>]`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GlossaryConfig {
    Local {
        #[serde(default)]
        name: Option<String>,
        /// TMX or tab-separated file, relative to the config file directory.
        path: PathBuf,
        /// Column languages of a tab-separated file.
        #[serde(default)]
        src_lang: String,
        #[serde(default)]
        tgt_lang: String,
    },
    Remote {
        #[serde(default)]
        name: Option<String>,
        server: String,
        #[serde(default)]
        user: String,
        #[serde(default)]
        password: String,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
}

impl GlossaryConfig {
    #[must_use]
    pub fn display_name(&self, id: &str) -> String {
        let name = match self {
            Self::Local { name, .. } | Self::Remote { name, .. } => name.as_deref(),
        };
        name.map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(id)
            .to_string()
    }
}

/// Effective assembler settings after defaults are applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblerSettings {
    pub max_term_length: usize,
    pub creation_tool: String,
    pub creation_tool_version: String,
    pub first_marker_id: u32,
}

impl Default for AssemblerSettings {
    fn default() -> Self {
        Self {
            max_term_length: DEFAULT_MAX_TERM_LENGTH,
            creation_tool: DEFAULT_CREATION_TOOL.to_string(),
            creation_tool_version: env!("CARGO_PKG_VERSION").to_string(),
            first_marker_id: 1,
        }
    }
}

impl AppConfig {
    #[must_use]
    pub fn assembler_settings(&self) -> AssemblerSettings {
        let d = AssemblerSettings::default();
        let a = &self.assembler;
        AssemblerSettings {
            max_term_length: a.max_term_length.unwrap_or(d.max_term_length),
            creation_tool: a
                .creation_tool
                .as_deref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(d.creation_tool),
            creation_tool_version: a
                .creation_tool_version
                .as_deref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(d.creation_tool_version),
            first_marker_id: a.first_marker_id.unwrap_or(d.first_marker_id),
        }
    }
}

pub fn find_file_upwards(start: &Path, filename: &str, max_depth: usize) -> Option<PathBuf> {
    let mut dir = Some(start);
    for _ in 0..=max_depth {
        let d = dir?;
        let cand = d.join(filename);
        if cand.is_file() {
            return Some(cand);
        }
        dir = d.parent();
    }
    None
}

/// `$TM_ASSEMBLE_CONFIG` first, then the nearest `tm-assemble.toml` above the
/// working directory, then above `workdir` (e.g. the request file's
/// directory), then above the executable.
pub fn find_default_config(workdir: Option<&Path>, filename: &str) -> Option<PathBuf> {
    if let Some(p) = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from) {
        if p.is_file() {
            return Some(p);
        }
        log::warn!("{CONFIG_ENV_VAR} points to a missing file: {}", p.display());
    }
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Some(p) = workdir.and_then(|d| find_file_upwards(d, filename, 8)) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

#[must_use]
pub fn config_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf()
}

const DEFAULT_CONFIG_TOML: &str = r#"# tm-assemble configuration

[assembler]
# Longest word window looked up by the glossary-only fallback.
max_term_length = 5
creation_tool = "tm-assemble"
# creation_tool_version defaults to the binary version.
first_marker_id = 1

# A glossary kept in a local TMX file.
[glossaries.main]
name = "Main glossary"
type = "local"
path = "glossary.tmx"

# A tab-separated glossary needs its column languages.
# [glossaries.legal]
# type = "local"
# path = "legal.tsv"
# src_lang = "en"
# tgt_lang = "fr"

# A glossary served by a remote terminology server.
# [glossaries.corporate]
# type = "remote"
# server = "https://terms.example.com/api"
# user = "translator"
# password = "secret"
# timeout_secs = 30
"#;

/// Writes a commented starter config. Refuses to overwrite unless `force`.
pub fn init_default_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!(
            "config already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create config dir: {}", dir.display()))?;
    }
    std::fs::write(path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", path.display()))?;
    Ok(())
}
