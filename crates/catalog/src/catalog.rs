//! Keyword catalog keyed by `Library.Keyword` references.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use robotkernel_core_types::{normalize_name, ArgSpec, KeywordDoc, LibraryDoc};
use robotkernel_suite::Suite;
use serde::Serialize;
use tracing::debug;

use crate::index::{Query, SearchIndex, DOTTED_NAME_FIELD, NAME_FIELD};

/// Needles shorter than this never fall back to fuzzy matching.
const FUZZY_MIN_LEN: usize = 4;
const FUZZY_DISTANCE: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    Library,
    Resource,
    Suite,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KeywordEntry {
    pub reference: String,
    pub library: String,
    pub name: String,
    pub args: Vec<ArgSpec>,
    pub doc: String,
    pub tags: Vec<String>,
    pub source: EntrySource,
}

impl KeywordEntry {
    pub fn new(library: &str, doc: &KeywordDoc, source: EntrySource) -> Self {
        Self {
            reference: format!("{library}.{}", doc.name),
            library: library.to_string(),
            name: doc.name.clone(),
            args: doc.args.clone(),
            doc: doc.doc.clone(),
            tags: doc.tags.clone(),
            source,
        }
    }

    /// Call signature in cell syntax, e.g. `Get From List  list  index`.
    pub fn signature(&self) -> String {
        let mut parts = vec![self.name.clone()];
        parts.extend(self.args.iter().map(ToString::to_string));
        parts.join("  ")
    }

    pub fn plain_text(&self) -> String {
        let mut text = format!("{}\n\nLibrary: {}", self.name, self.library);
        if !self.args.is_empty() {
            text.push_str("\nArguments: ");
            text.push_str(
                &self
                    .args
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }
        if !self.doc.is_empty() {
            text.push_str("\n\n");
            text.push_str(&self.doc);
        }
        text
    }

    pub fn markdown(&self) -> String {
        let mut text = format!("## {}\n\n*{}*\n\n`{}`", self.name, self.library, self.signature());
        if !self.tags.is_empty() {
            text.push_str(&format!("\n\nTags: {}", self.tags.join(", ")));
        }
        if !self.doc.is_empty() {
            text.push_str("\n\n");
            text.push_str(&self.doc);
        }
        text
    }
}

/// Known keywords plus the search index derived from them.
#[derive(Clone, Debug)]
pub struct Catalog {
    index: SearchIndex,
    entries: Vec<KeywordEntry>,
    positions: HashMap<String, usize>,
    libraries: Vec<String>,
    available: Vec<String>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            index: SearchIndex::for_keywords(),
            entries: Vec::new(),
            positions: HashMap::new(),
            libraries: Vec::new(),
            available: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &KeywordEntry> {
        self.entries.iter()
    }

    /// Imported library names in import order.
    pub fn libraries(&self) -> &[String] {
        &self.libraries
    }

    /// Library names offered by `complete_libraries` besides imported ones.
    pub fn set_available_libraries<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available = names.into_iter().map(Into::into).collect();
    }

    /// Registers or refreshes every keyword of a library.
    pub fn import_library(&mut self, library: &LibraryDoc) -> usize {
        if !self.libraries.contains(&library.name) {
            self.libraries.push(library.name.clone());
        }
        for doc in &library.keywords {
            self.upsert(KeywordEntry::new(&library.name, doc, EntrySource::Library));
        }
        debug!(library = %library.name, keywords = library.keywords.len(), "catalog imported library");
        library.keywords.len()
    }

    /// Registers user keywords of the suite resource, qualified by the
    /// resource they came from or by the suite name.
    pub fn import_from_suite(&mut self, suite: &Suite) -> usize {
        for keyword in &suite.resource.keywords {
            let (library, source) = match &keyword.origin {
                Some(origin) => (origin.as_str(), EntrySource::Resource),
                None => (suite.name.as_str(), EntrySource::Suite),
            };
            self.upsert(KeywordEntry::new(library, &keyword.to_doc(), source));
        }
        suite.resource.keywords.len()
    }

    /// Inserts an entry, or replaces the one with the same reference in place.
    pub fn upsert(&mut self, entry: KeywordEntry) {
        let key = entry.reference.to_lowercase();
        self.index.upsert(
            &key,
            &[
                (DOTTED_NAME_FIELD, entry.reference.as_str()),
                (NAME_FIELD, entry.name.as_str()),
            ],
        );
        match self.positions.get(&key) {
            Some(&pos) => self.entries[pos] = entry,
            None => {
                self.positions.insert(key, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn get(&self, reference: &str) -> Option<&KeywordEntry> {
        self.positions
            .get(&reference.to_lowercase())
            .map(|&pos| &self.entries[pos])
    }

    /// Entry whose reference or display name equals `name` once normalized.
    pub fn lookup(&self, name: &str) -> Option<&KeywordEntry> {
        let wanted = normalize_name(name);
        if wanted.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|entry| normalize_name(&entry.reference) == wanted)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|entry| normalize_name(&entry.name) == wanted)
            })
    }

    /// Wildcard hits followed by exact-token hits, deduplicated by reference.
    /// Falls back to fuzzy term matching for longer needles without hits.
    pub fn search(&self, needle: &str) -> Vec<&KeywordEntry> {
        let Some(query) = Query::parse(needle) else {
            return Vec::new();
        };
        let mut seen: Vec<String> = Vec::new();
        for hit in self
            .index
            .search(&query)
            .into_iter()
            .chain(self.index.search(&query.exact()))
        {
            if !seen.contains(&hit.reference) {
                seen.push(hit.reference);
            }
        }
        if seen.is_empty() && needle.trim().chars().count() >= FUZZY_MIN_LEN {
            seen = self
                .index
                .search(&query.fuzzy(FUZZY_DISTANCE))
                .into_iter()
                .map(|hit| hit.reference)
                .collect();
        }
        seen.iter()
            .filter_map(|key| self.positions.get(key))
            .map(|&pos| &self.entries[pos])
            .collect()
    }

    /// Re-creates the search index from the catalog contents.
    pub fn rebuild(&mut self) {
        self.index.clear();
        for entry in &self.entries {
            self.index.upsert(
                &entry.reference.to_lowercase(),
                &[
                    (DOTTED_NAME_FIELD, entry.reference.as_str()),
                    (NAME_FIELD, entry.name.as_str()),
                ],
            );
        }
    }

    /// Drops every entry and imported library.
    pub fn clear(&mut self) {
        self.index.clear();
        self.entries.clear();
        self.positions.clear();
        self.libraries.clear();
    }

    /// Importable and imported library names starting with `needle`.
    pub fn complete_libraries(&self, needle: &str) -> Vec<String> {
        let needle = needle.to_lowercase();
        let mut matches: Vec<String> = Vec::new();
        for name in self.available.iter().chain(self.libraries.iter()) {
            if name.to_lowercase().starts_with(&needle) && !matches.contains(name) {
                matches.push(name.clone());
            }
        }
        matches
    }
}

/// Shared catalog handle used by the session and the indexer listener.
#[derive(Clone, Default)]
pub struct CatalogHandle {
    inner: Arc<RwLock<Catalog>>,
}

impl CatalogHandle {
    pub fn new_with(catalog: Catalog) -> Self {
        Self {
            inner: Arc::new(RwLock::new(catalog)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Catalog> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.inner.write()
    }

    pub fn snapshot(&self) -> Catalog {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collections() -> LibraryDoc {
        LibraryDoc {
            name: "Collections".into(),
            doc: String::new(),
            version: "1.0".into(),
            keywords: vec![
                KeywordDoc::new("Get From List", &["list", "index"], "Returns the value at index."),
                KeywordDoc::new("Append To List", &["list_", "*values"], "Adds values."),
            ],
        }
    }

    #[test]
    fn lookup_matches_reference_or_name() {
        let mut catalog = Catalog::new();
        catalog.import_library(&collections());
        assert_eq!(
            catalog.lookup("collections.get from list").unwrap().reference,
            "Collections.Get From List"
        );
        assert!(catalog.lookup("get_from_list").is_some());
        assert!(catalog.lookup("get from").is_none());
        assert!(catalog.lookup("").is_none());
    }

    #[test]
    fn reimport_replaces_in_place() {
        let mut catalog = Catalog::new();
        catalog.import_library(&collections());
        let mut updated = collections();
        updated.keywords[0].doc = "New docs.".into();
        catalog.import_library(&updated);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.libraries(), ["Collections".to_string()]);
        assert_eq!(catalog.get("collections.get from list").unwrap().doc, "New docs.");
    }

    #[test]
    fn signature_and_markdown() {
        let mut catalog = Catalog::new();
        catalog.import_library(&collections());
        let entry = catalog.get("Collections.Append To List").unwrap();
        assert_eq!(entry.signature(), "Append To List  list_  *values");
        assert!(entry.markdown().starts_with("## Append To List"));
        assert!(entry.plain_text().contains("Arguments: list_, *values"));
    }

    #[test]
    fn complete_libraries_by_prefix() {
        let mut catalog = Catalog::new();
        catalog.set_available_libraries(["BuiltIn", "Collections", "String"]);
        catalog.import_library(&collections());
        assert_eq!(catalog.complete_libraries("co"), vec!["Collections".to_string()]);
        assert_eq!(catalog.complete_libraries("").len(), 3);
    }

    #[test]
    fn rebuild_keeps_results() {
        let mut catalog = Catalog::new();
        catalog.import_library(&collections());
        let before: Vec<_> = catalog.search("list").iter().map(|e| e.reference.clone()).collect();
        catalog.rebuild();
        let after: Vec<_> = catalog.search("list").iter().map(|e| e.reference.clone()).collect();
        assert_eq!(before, after);
    }
}
