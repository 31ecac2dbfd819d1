pub mod assembler;
pub mod config;
pub mod diff;
pub mod error;
pub mod ir;
pub mod language;
pub mod markup;
pub mod progress;
pub mod quality;
pub mod registry;
pub mod remote;
pub mod request;
pub mod sentinels;
pub mod splice;
pub mod terminology;
pub mod textutil;

pub use assembler::MatchAssembler;
pub use config::{AppConfig, AssemblerSettings};
pub use error::{AssemblyError, LanguageError, LookupError, MarkupError, RegistryError};
pub use ir::{Match, Provenance, Term};
pub use markup::RichText;
pub use registry::EngineRegistry;
pub use terminology::{GlossaryEngine, LocalGlossary, TerminologyLookup};
