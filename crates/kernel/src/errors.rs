use std::io;
use std::path::PathBuf;

use robotkernel_engine::EngineError;
use robotkernel_suite::DataError;
use thiserror::Error;

use crate::evaluation::EvaluationError;

/// Failures while inlining run artifacts. Never fatal for a run.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("not an embeddable image reference: {0}")]
    Unsupported(String),
    #[error("malformed data URI: {0}")]
    DataUri(String),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

pub type ArtifactResult<T> = Result<T, ArtifactError>;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error("failed to prepare scratch directory: {0}")]
    Scratch(#[source] io::Error),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error("no trigger named '{0}'")]
    UnknownTrigger(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl KernelError {
    /// Error type name reported as `ename` in error replies.
    pub fn ename(&self) -> &'static str {
        match self {
            Self::Data(err) => err.kind(),
            Self::Engine(err) => err.kind(),
            Self::Evaluation(_) => "EvaluationError",
            Self::Scratch(_) | Self::Artifact(_) => "OSError",
            Self::UnknownTrigger(_) => "KeyError",
            Self::Config(_) => "ConfigError",
        }
    }

    pub fn traceback(&self, code: &str) -> Vec<String> {
        match self {
            Self::Data(err) => err.traceback(code),
            Self::Evaluation(err) => err.traceback(),
            other => vec![format!("{}: {}", other.ename(), other)],
        }
    }
}

pub type KernelResult<T> = Result<T, KernelError>;
