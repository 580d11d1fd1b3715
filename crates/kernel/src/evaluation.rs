//! `%%module <Name>` cells: code evaluated inside a named, long-lived
//! evaluation context by a pluggable [`Evaluator`].

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use robotkernel_core_types::Value;
use thiserror::Error;
use tracing::debug;

static MODULE_MAGIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%%module ([A-Za-z_][A-Za-z0-9_]*)").unwrap());

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("no evaluator is configured; cannot evaluate module '{0}'")]
    NoEvaluator(String),
    #[error("{message}")]
    Failed {
        module: String,
        message: String,
        traceback: Vec<String>,
    },
}

impl EvaluationError {
    pub fn failed(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            module: module.into(),
            message: message.into(),
            traceback: Vec::new(),
        }
    }

    pub fn traceback(&self) -> Vec<String> {
        match self {
            Self::Failed { traceback, .. } if !traceback.is_empty() => traceback.clone(),
            other => vec![format!("EvaluationError: {other}")],
        }
    }
}

/// State owned by one named module; survives across cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationContext {
    pub module: String,
    pub bindings: BTreeMap<String, Value>,
    pub evaluations: usize,
}

impl EvaluationContext {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            ..Self::default()
        }
    }
}

/// Evaluates module source inside its context. Returns the value worth
/// showing, if any.
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(
        &self,
        context: &mut EvaluationContext,
        code: &str,
    ) -> Result<Option<Value>, EvaluationError>;
}

/// Splits `%%module Name` off a cell, returning the module name and body.
pub fn parse_module_magic(code: &str) -> Option<(&str, &str)> {
    let captures = MODULE_MAGIC.captures(code)?;
    let whole = captures.get(0)?;
    let name = captures.get(1)?;
    Some((name.as_str(), &code[whole.end()..]))
}

/// Named evaluation contexts plus the evaluator that runs code in them.
#[derive(Default)]
pub struct ModuleRegistry {
    evaluator: Option<Arc<dyn Evaluator>>,
    contexts: BTreeMap<String, EvaluationContext>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_evaluator(&mut self, evaluator: Arc<dyn Evaluator>) {
        self.evaluator = Some(evaluator);
    }

    pub fn has_evaluator(&self) -> bool {
        self.evaluator.is_some()
    }

    pub fn context(&self, module: &str) -> Option<&EvaluationContext> {
        self.contexts.get(module)
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.contexts.keys().map(String::as_str)
    }

    /// Runs `code` in `module`, creating the context on first use.
    pub fn evaluate(&mut self, module: &str, code: &str) -> Result<Option<Value>, EvaluationError> {
        let evaluator = self
            .evaluator
            .clone()
            .ok_or_else(|| EvaluationError::NoEvaluator(module.to_string()))?;
        let context = self
            .contexts
            .entry(module.to_string())
            .or_insert_with(|| EvaluationContext::new(module));
        context.evaluations += 1;
        debug!(module, evaluator = evaluator.name(), "evaluating module cell");
        evaluator.evaluate(context, code)
    }

    pub fn clear(&mut self) {
        self.contexts.clear();
    }
}
