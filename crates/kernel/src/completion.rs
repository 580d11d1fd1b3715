//! Completion and inspection over the catalog, the variable history and
//! live connections.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use robotkernel_catalog::{find_variables, scored_results, Catalog, VariableHistory};
use robotkernel_event_bus::{Connection, ListenerError};
use tracing::{debug, warn};

use crate::frontend::MimeBundle;
use crate::listeners::ConnectionRegistry;
use crate::reply::{CompleteReply, InspectReply};

static CELL_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}|\t| \| ").unwrap());

/// Completes locator/selector syntax against a live connection, e.g. CSS
/// selectors against an open browser.
pub trait SelectorRecognizer: Send + Sync {
    fn name(&self) -> &str;

    /// Kinds of connection the recognizer needs; empty when it needs none.
    fn connection_kinds(&self) -> &[String];

    fn recognizes(&self, needle: &str) -> bool;

    fn complete(&self, needle: &str, connection: Option<&Arc<dyn Connection>>) -> Vec<String>;

    /// Clears whatever the recognizer highlighted on the connection. An error
    /// marks the connection as broken.
    fn clear_highlights(&self, _connection: &Arc<dyn Connection>) -> Result<(), ListenerError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionContext {
    Variable,
    Selector(usize),
    Library,
    Keyword,
}

/// Line containing the cursor and the char offset at which it starts.
/// A cursor right after a trailing newline sits on an empty last line.
pub fn line_at_cursor(code: &str, cursor: usize) -> (&str, usize) {
    let mut offset = 0;
    for line in code.split_inclusive('\n') {
        let mut next = offset + line.chars().count();
        if !line.ends_with('\n') {
            next += 1;
        }
        if next > cursor {
            return (line, offset);
        }
        offset = next;
    }
    ("", offset)
}

fn split_at_char(text: &str, pos: usize) -> (&str, &str) {
    let idx = text
        .char_indices()
        .nth(pos)
        .map_or(text.len(), |(idx, _)| idx);
    text.split_at(idx)
}

/// Last cell of the text left of the cursor.
pub fn left_needle(left: &str) -> &str {
    CELL_SEPARATOR.split(left).last().unwrap_or_default()
}

/// First cell of the text right of the cursor.
pub fn right_needle(right: &str) -> &str {
    CELL_SEPARATOR.split(right).next().unwrap_or_default()
}

/// Whether the cursor sits inside a `*** Settings ***` section.
pub fn in_settings(code: &str, cursor: usize) -> bool {
    let (before, _) = split_at_char(code, cursor);
    before
        .lines()
        .filter(|line| line.starts_with('*'))
        .last()
        .map(|header| {
            let name = header
                .trim_matches(|c: char| c == '*' || c.is_whitespace())
                .to_lowercase();
            name == "settings" || name == "setting"
        })
        .unwrap_or(false)
}

pub struct Resolver<'a> {
    pub catalog: &'a Catalog,
    pub variables: &'a VariableHistory,
    pub connections: &'a ConnectionRegistry,
    pub recognizers: &'a [Arc<dyn SelectorRecognizer>],
    /// Maximum keyword candidates; zero keeps all.
    pub limit: usize,
}

impl Resolver<'_> {
    pub fn context(&self, code: &str, cursor: usize, line: &str, needle: &str) -> CompletionContext {
        if needle.starts_with(['$', '@', '&', '%']) {
            return CompletionContext::Variable;
        }
        if let Some(idx) = self
            .recognizers
            .iter()
            .position(|recognizer| recognizer.recognizes(needle))
        {
            return CompletionContext::Selector(idx);
        }
        let lower = line.to_lowercase();
        let library_line = (in_settings(code, cursor) && lower.starts_with("library "))
            || lower.contains("import library ")
            || lower.contains("reload library ")
            || lower.contains("get library instance");
        if library_line {
            CompletionContext::Library
        } else {
            CompletionContext::Keyword
        }
    }

    pub fn complete(&self, code: &str, cursor: Option<usize>) -> CompleteReply {
        let mut cursor = cursor.unwrap_or_else(|| code.chars().count());
        let (line, offset) = line_at_cursor(code, cursor);
        let line_cursor = cursor - offset;
        let (left, right) = split_at_char(line, line_cursor);
        let mut needle = left_needle(left).trim_start().to_string();
        debug!(needle = %needle, "completing");

        let context = self.context(code, cursor, line, &needle);
        debug!(?context, "completion context");
        let matches = match context {
            CompletionContext::Variable => {
                let matches = self.complete_variable(code, &needle);
                if right.starts_with('}') {
                    cursor += 1;
                    needle.push('}');
                }
                matches
            }
            CompletionContext::Selector(idx) => self.complete_selector(idx, &needle),
            CompletionContext::Library => self.catalog.complete_libraries(&needle),
            CompletionContext::Keyword => {
                self.clear_highlights();
                self.complete_keyword(&needle)
            }
        };
        debug!(?matches, "completion candidates");
        CompleteReply::new(matches, cursor - needle.chars().count(), cursor)
    }

    fn complete_variable(&self, code: &str, needle: &str) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::new();
        for name in self
            .variables
            .names()
            .iter()
            .cloned()
            .chain(find_variables(code))
        {
            if !candidates.contains(&name) {
                candidates.push(name);
            }
        }
        let lowered = needle.to_lowercase();
        scored_results(needle, candidates, |name| name.as_str())
            .into_iter()
            .filter(|name| name.to_lowercase().contains(&lowered))
            .collect()
    }

    fn complete_selector(&self, idx: usize, needle: &str) -> Vec<String> {
        let recognizer = &self.recognizers[idx];
        let kinds: Vec<&str> = recognizer
            .connection_kinds()
            .iter()
            .map(String::as_str)
            .collect();
        if kinds.is_empty() {
            return recognizer.complete(needle, None);
        }
        match self.connections.most_recent(&kinds) {
            Some(connection) => recognizer.complete(needle.trim_end(), Some(&connection)),
            None => {
                debug!(recognizer = recognizer.name(), "no open connection for selector");
                Vec::new()
            }
        }
    }

    fn complete_keyword(&self, needle: &str) -> Vec<String> {
        if needle.trim().is_empty() {
            return Vec::new();
        }
        let lowered = needle.to_lowercase();
        let hits = self.catalog.search(needle);
        let mut matches: Vec<String> = Vec::new();
        for entry in scored_results(needle, hits, |entry| entry.reference.as_str()) {
            let candidate = if entry.name.to_lowercase().contains(&lowered) {
                &entry.name
            } else {
                &entry.reference
            };
            if candidate.to_lowercase().contains(&lowered) && !matches.contains(candidate) {
                matches.push(candidate.clone());
            }
            if self.limit > 0 && matches.len() >= self.limit {
                break;
            }
        }
        matches
    }

    /// Resets recognizer highlights on open connections, dropping the
    /// connections that turn out to be broken.
    pub fn clear_highlights(&self) {
        for recognizer in self.recognizers {
            let kinds: Vec<&str> = recognizer
                .connection_kinds()
                .iter()
                .map(String::as_str)
                .collect();
            if kinds.is_empty() {
                continue;
            }
            if let Some(connection) = self.connections.most_recent(&kinds) {
                if let Err(err) = recognizer.clear_highlights(&connection) {
                    warn!(recognizer = recognizer.name(), error = %err, "dropping broken connection");
                    self.connections.remove(&connection);
                }
            }
        }
    }

    pub fn inspect(&self, code: &str, cursor: Option<usize>) -> InspectReply {
        let cursor = cursor.unwrap_or_else(|| code.chars().count());
        let (line, offset) = line_at_cursor(code, cursor);
        let (left, right) = split_at_char(line, cursor - offset);
        let needle = format!(
            "{}{}",
            left_needle(left).trim_start().to_lowercase(),
            right_needle(right).trim_end().to_lowercase()
        );
        if needle.is_empty() {
            return InspectReply::not_found();
        }
        let found = self.catalog.search(&needle).into_iter().find(|entry| {
            needle == entry.name.to_lowercase() || needle == entry.reference.to_lowercase()
        });
        match found {
            Some(entry) => {
                debug!(reference = %entry.reference, "inspecting keyword");
                let mut data = MimeBundle::new();
                data.insert("text/plain".into(), entry.plain_text().into());
                data.insert("text/markdown".into(), entry.markdown().into());
                InspectReply::new(data)
            }
            None => InspectReply::not_found(),
        }
    }
}
