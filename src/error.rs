//! Error taxonomy for match assembly and its collaborators.
//!
//! Only `MarkupError` is ever recovered inside an assembly (the offending
//! candidate is dropped). Lookup and language failures surface to the caller
//! of that one segment.

use thiserror::Error;

/// Malformed inline markup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed markup: {message}")]
pub struct MarkupError {
    pub message: String,
}

impl MarkupError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Terminology or retrieval collaborator failure.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("glossary I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("glossary transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote glossary reported {status}: {reason}")]
    Remote { status: String, reason: String },

    #[error("cannot decode glossary data: {0}")]
    Decode(String),

    #[error("glossary '{0}' is closed")]
    Closed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LanguageError {
    #[error("unknown language code '{code}'")]
    Unknown { code: String },
}

/// Failure of one whole assembly call.
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Language(#[from] LanguageError),
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("glossary '{0}' is not configured")]
    Unknown(String),

    #[error("glossary '{0}' is not open")]
    NotOpen(String),

    #[error("cannot open glossary '{id}': {source}")]
    Open {
        id: String,
        #[source]
        source: LookupError,
    },
}

pub type AssemblyResult<T> = Result<T, AssemblyError>;
pub type LookupResult<T> = Result<T, LookupError>;
