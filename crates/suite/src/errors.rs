use robotkernel_core_types::RpaMode;
use thiserror::Error;

/// Errors raised while turning a unit into suite definitions.
///
/// A unit that fails with any of these leaves the suite untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("Error on line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("One file cannot have both tests and tasks.")]
    MixedMode { line: usize },
    #[error("Cannot add {unit:?} to a suite with pending {pending:?}.")]
    ModeConflict { pending: RpaMode, unit: RpaMode },
    #[error("Resource file '{path}' could not be imported: {reason}")]
    Resource {
        line: usize,
        path: String,
        reason: String,
    },
}

impl DataError {
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    /// Class name reported as `ename` in error replies.
    pub fn kind(&self) -> &'static str {
        "DataError"
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Syntax { line, .. } | Self::MixedMode { line } | Self::Resource { line, .. } => {
                Some(*line)
            }
            Self::ModeConflict { .. } => None,
        }
    }

    /// Structured traceback lines pointing at the offending source line.
    pub fn traceback(&self, source: &str) -> Vec<String> {
        let mut lines = vec![format!("{}: {}", self.kind(), self)];
        if let Some(line) = self.line() {
            if let Some(text) = source.lines().nth(line.saturating_sub(1)) {
                lines.push(format!("  line {line}: {}", text.trim_end()));
            }
        }
        lines
    }
}

pub type DataResult<T> = Result<T, DataError>;
