//! Abstract syntax produced by a [`UnitParser`](crate::parser::UnitParser).
//!
//! The tree is deliberately loose: parsers record problems as
//! [`Node::Error`] entries instead of failing, and the
//! [`ErrorReporter`](crate::validate::ErrorReporter) decides what is fatal.

use std::path::PathBuf;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct File {
    pub curdir: PathBuf,
    pub sections: Vec<Section>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionKind {
    /// Content before the first section header.
    Implicit,
    Settings,
    Variables,
    TestCases,
    Tasks,
    Keywords,
    Comments,
    Invalid,
}

impl SectionKind {
    pub fn from_header(header: &str) -> Self {
        let name = header.trim_matches(|c: char| c == '*' || c.is_whitespace());
        match name.to_lowercase().as_str() {
            "settings" | "setting" => Self::Settings,
            "variables" | "variable" => Self::Variables,
            "test cases" | "test case" => Self::TestCases,
            "tasks" | "task" => Self::Tasks,
            "keywords" | "keyword" => Self::Keywords,
            "comments" | "comment" => Self::Comments,
            _ => Self::Invalid,
        }
    }

    /// `Some(true)` for task sections, `Some(false)` for test sections.
    pub fn tasks(self) -> Option<bool> {
        match self {
            Self::Tasks => Some(true),
            Self::TestCases => Some(false),
            _ => None,
        }
    }

    pub fn holds_blocks(self) -> bool {
        matches!(self, Self::TestCases | Self::Tasks | Self::Keywords)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    pub header: String,
    pub line: usize,
    pub body: Vec<Node>,
}

impl Section {
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.body.iter().filter_map(|node| match node {
            Node::Statement(statement) => Some(statement),
            _ => None,
        })
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.body.iter().filter_map(|node| match node {
            Node::Block(block) => Some(block),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Statement(Statement),
    Block(Block),
    Error(ParseIssue),
}

/// One logical line split into data tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statement {
    pub line: usize,
    pub tokens: Vec<String>,
}

impl Statement {
    pub fn head(&self) -> &str {
        self.tokens.first().map(String::as_str).unwrap_or_default()
    }

    pub fn rest(&self) -> &[String] {
        self.tokens.get(1..).unwrap_or_default()
    }

    /// `[Setting]` name when the statement is a block-level setting.
    pub fn block_setting(&self) -> Option<&str> {
        let head = self.head();
        if head.len() > 2 && head.starts_with('[') && head.ends_with(']') {
            Some(head[1..head.len() - 1].trim())
        } else {
            None
        }
    }
}

/// A named test, task or keyword with its body statements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub name: String,
    pub line: usize,
    pub body: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseIssue {
    pub line: usize,
    pub message: String,
}

impl File {
    /// Task/test flags of every executable section, in order.
    pub fn item_section_flags(&self) -> Vec<(bool, usize)> {
        self.sections
            .iter()
            .filter_map(|section| section.kind.tasks().map(|tasks| (tasks, section.line)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_headers_are_case_insensitive() {
        assert_eq!(SectionKind::from_header("*** Test Cases ***"), SectionKind::TestCases);
        assert_eq!(SectionKind::from_header("***tasks***"), SectionKind::Tasks);
        assert_eq!(SectionKind::from_header("* Keyword"), SectionKind::Keywords);
        assert_eq!(SectionKind::from_header("*** Bogus ***"), SectionKind::Invalid);
    }

    #[test]
    fn block_setting_strips_brackets() {
        let statement = Statement {
            line: 1,
            tokens: vec!["[Arguments]".into(), "${x}".into()],
        };
        assert_eq!(statement.block_setting(), Some("Arguments"));
        assert_eq!(statement.rest(), ["${x}".to_string()]);
    }
}
