use std::path::PathBuf;

use thiserror::Error;

/// Failures that keep a run from producing results at all.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Importing library '{name}' failed: {reason}")]
    Import { name: String, reason: String },
    #[error("could not write '{path}': {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not read '{path}': {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Error type name shown to the user.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Import { .. } => "ImportError",
            Self::Output { .. } | Self::Input { .. } => "OSError",
        }
    }

    pub fn import(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Import {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// A keyword failed; the message ends up in the test status.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct KeywordFailure {
    pub message: String,
}

impl KeywordFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type KeywordResult<T> = Result<T, KeywordFailure>;
