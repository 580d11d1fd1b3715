//! Payloads delivered to execution listeners.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use robotkernel_core_types::Value;
use serde::{Deserialize, Serialize};

use crate::errors::ListenerError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Start,
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Suite,
    Test,
    Keyword,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
    #[serde(rename = "NOT RUN")]
    NotRun,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::NotRun => "NOT RUN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Start or end of a suite, test or keyword.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub phase: Phase,
    pub scope: Scope,
    pub name: String,
    /// Only set on `Phase::End`.
    pub status: Option<Status>,
    pub message: String,
    /// Keyword nesting depth; zero for suites and tests.
    pub depth: usize,
}

impl StatusEvent {
    pub fn started(scope: Scope, name: impl Into<String>, depth: usize) -> Self {
        Self {
            phase: Phase::Start,
            scope,
            name: name.into(),
            status: None,
            message: String::new(),
            depth,
        }
    }

    pub fn ended(
        scope: Scope,
        name: impl Into<String>,
        depth: usize,
        status: Status,
        message: impl Into<String>,
    ) -> Self {
        Self {
            phase: Phase::End,
            scope,
            name: name.into(),
            status: Some(status),
            message: message.into(),
            depth,
        }
    }
}

/// Value a keyword produced when it finished.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnValueEvent {
    pub keyword: String,
    /// One for keywords called directly from a test.
    pub depth: usize,
    pub value: Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableScope {
    Local,
    Test,
    Suite,
    Global,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariableEvent {
    /// Decorated name such as `${head}`.
    pub name: String,
    pub value: Value,
    pub scope: VariableScope,
    /// Set while a user keyword body is executing.
    pub in_user_keyword: bool,
}

/// A runtime resource opened by a keyword, such as a browser session.
pub trait Connection: Send + Sync + fmt::Debug {
    /// Capability kind, e.g. `"browser"` or `"desktop"`.
    fn kind(&self) -> &str;

    fn is_closable(&self) -> bool {
        false
    }

    fn close(&self) -> Result<(), ListenerError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone, Debug)]
pub struct ConnectionEvent {
    pub kind: String,
    pub handle: Arc<dyn Connection>,
}
