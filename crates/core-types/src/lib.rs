//! Shared primitives for the robotkernel crates: identifiers, runtime values,
//! keyword documentation and name normalization.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod value;

pub use value::Value;

/// Identifier of a notebook cell as reported by the host.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CellId(pub String);

impl CellId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for CellId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a display element that can be updated in place.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DisplayId(pub String);

impl DisplayId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for DisplayId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether executable items are tasks (process automation) or tests.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpaMode {
    Tasks,
    Tests,
    #[default]
    Unknown,
}

impl RpaMode {
    pub fn from_flag(tasks: Option<bool>) -> Self {
        match tasks {
            Some(true) => Self::Tasks,
            Some(false) => Self::Tests,
            None => Self::Unknown,
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    pub fn is_tasks(self) -> bool {
        matches!(self, Self::Tasks)
    }

    /// Section header used when synthesizing a unit for this mode.
    pub fn section_header(self) -> &'static str {
        if self.is_tasks() {
            "Tasks"
        } else {
            "Test Cases"
        }
    }

    pub fn item_label(self, count: usize) -> String {
        let noun = if self.is_tasks() { "task" } else { "test" };
        if count == 1 {
            format!("{count} {noun}")
        } else {
            format!("{count} {noun}s")
        }
    }
}

/// One declared keyword argument: `(name, normalized identifier, default)`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    pub identifier: String,
    pub default: Option<String>,
}

impl ArgSpec {
    /// Splits `${name}=default` and derives a word-only identifier.
    pub fn parse(raw: &str) -> Self {
        let (name, default) = match raw.split_once('=') {
            Some((name, default)) => (name, Some(default.to_string())),
            None => (raw, None),
        };
        let identifier = name
            .trim_matches(|c: char| !is_word_char(c))
            .chars()
            .map(|c| if is_word_char(c) { c } else { '_' })
            .collect();
        Self {
            name: name.to_string(),
            identifier,
            default,
        }
    }

    pub fn is_varargs(&self) -> bool {
        self.name.starts_with('@') || self.name.starts_with('*')
    }
}

impl fmt::Display for ArgSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.default {
            Some(default) => write!(f, "{}={}", self.name, default),
            None => f.write_str(&self.name),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Documentation of a single keyword as exposed by a library or resource.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordDoc {
    pub name: String,
    pub args: Vec<ArgSpec>,
    pub doc: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl KeywordDoc {
    pub fn new(name: impl Into<String>, args: &[&str], doc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: args.iter().map(|arg| ArgSpec::parse(arg)).collect(),
            doc: doc.into(),
            tags: Vec::new(),
        }
    }

    /// First paragraph of the documentation.
    pub fn short_doc(&self) -> &str {
        self.doc.split("\n\n").next().unwrap_or_default().trim()
    }
}

/// Documentation of an importable library.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryDoc {
    pub name: String,
    pub doc: String,
    pub version: String,
    pub keywords: Vec<KeywordDoc>,
}

/// Normalizes keyword and variable names: case, spaces and underscores are
/// insignificant.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arg_spec_splits_default_and_identifier() {
        let spec = ArgSpec::parse("${first name}=Robot");
        assert_eq!(spec.name, "${first name}");
        assert_eq!(spec.identifier, "first_name");
        assert_eq!(spec.default.as_deref(), Some("Robot"));

        let spec = ArgSpec::parse("@{items}");
        assert_eq!(spec.identifier, "items");
        assert!(spec.default.is_none());
        assert!(spec.is_varargs());
    }

    #[test]
    fn normalize_ignores_case_spaces_and_underscores() {
        assert_eq!(normalize_name("Get From_List"), "getfromlist");
        assert_eq!(normalize_name("getfromlist"), normalize_name("GET FROM LIST"));
    }

    #[test]
    fn rpa_mode_labels() {
        assert_eq!(RpaMode::Tasks.item_label(1), "1 task");
        assert_eq!(RpaMode::Tests.item_label(2), "2 tests");
        assert_eq!(RpaMode::Unknown.section_header(), "Test Cases");
        assert_eq!(RpaMode::from_flag(Some(true)), RpaMode::Tasks);
    }
}
