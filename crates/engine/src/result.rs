//! In-memory results of one run.

use chrono::Local;
use robotkernel_core_types::RpaMode;
use robotkernel_event_bus::Status;
use serde::Serialize;

pub(crate) fn timestamp() -> String {
    Local::now().format("%Y%m%d %H:%M:%S%.3f").to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Message {
    pub timestamp: String,
    pub level: String,
    pub html: bool,
    pub text: String,
}

impl Message {
    pub fn new(level: &str, text: impl Into<String>, html: bool) -> Self {
        Self {
            timestamp: timestamp(),
            level: level.to_uppercase(),
            html,
            text: text.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum BodyItem {
    Keyword(KeywordRecord),
    Message(Message),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KeywordRecord {
    pub name: String,
    pub library: Option<String>,
    pub kind: &'static str,
    pub assign: Vec<String>,
    pub args: Vec<String>,
    pub body: Vec<BodyItem>,
    pub status: Status,
    pub message: String,
    pub start: String,
    pub end: String,
}

impl KeywordRecord {
    pub fn new(name: &str, kind: &'static str, assign: &[String], args: &[String]) -> Self {
        Self {
            name: name.to_string(),
            library: None,
            kind,
            assign: assign.to_vec(),
            args: args.to_vec(),
            body: Vec::new(),
            status: Status::NotRun,
            message: String::new(),
            start: timestamp(),
            end: String::new(),
        }
    }

    pub(crate) fn finish(&mut self, status: Status, message: impl Into<String>) {
        self.status = status;
        self.message = message.into();
        self.end = timestamp();
    }

    /// Messages logged directly by this keyword and its children.
    pub fn messages(&self) -> Vec<&Message> {
        let mut found = Vec::new();
        for item in &self.body {
            match item {
                BodyItem::Message(message) => found.push(message),
                BodyItem::Keyword(child) => found.extend(child.messages()),
            }
        }
        found
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TestRecord {
    pub name: String,
    pub doc: String,
    pub tags: Vec<String>,
    pub setup: Option<KeywordRecord>,
    pub body: Vec<KeywordRecord>,
    pub teardown: Option<KeywordRecord>,
    pub status: Status,
    pub message: String,
    pub start: String,
    pub end: String,
}

impl TestRecord {
    pub fn passed(&self) -> bool {
        self.status == Status::Pass
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SuiteRecord {
    pub name: String,
    pub source: String,
    pub doc: String,
    pub metadata: Vec<(String, String)>,
    pub rpa: RpaMode,
    pub setup: Option<KeywordRecord>,
    pub tests: Vec<TestRecord>,
    pub teardown: Option<KeywordRecord>,
    pub status: Status,
    pub message: String,
    pub start: String,
    pub end: String,
}

impl SuiteRecord {
    pub fn statistics(&self) -> Statistics {
        let passed = self.tests.iter().filter(|test| test.passed()).count();
        Statistics {
            total: self.tests.len(),
            passed,
            failed: self.tests.len() - passed,
            rpa: self.rpa,
        }
    }
}

/// Pass and fail counts over executed items.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub rpa: RpaMode,
}

impl Statistics {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// `1 task, 1 passed, 0 failed`
    pub fn summary(&self) -> String {
        format!(
            "{}, {} passed, {} failed",
            self.rpa.item_label(self.total),
            self.passed,
            self.failed
        )
    }

    pub fn total_label(&self) -> &'static str {
        if self.rpa.is_tasks() {
            "All Tasks"
        } else {
            "All Tests"
        }
    }
}
