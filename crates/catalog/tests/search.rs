use robotkernel_catalog::{Catalog, EntrySource, KeywordEntry};
use robotkernel_core_types::{KeywordDoc, LibraryDoc};
use robotkernel_suite::{populate_suite, Suite, TestDefaults};

fn library(name: &str, keywords: Vec<KeywordDoc>) -> LibraryDoc {
    LibraryDoc {
        name: name.into(),
        doc: String::new(),
        version: String::new(),
        keywords,
    }
}

fn stdlib_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog.import_library(&library(
        "BuiltIn",
        vec![
            KeywordDoc::new("Log", &["message", "level=INFO"], "Logs the given message."),
            KeywordDoc::new("Should Be Equal", &["first", "second"], "Fails unless equal."),
            KeywordDoc::new("Create List", &["*items"], "Returns a list."),
        ],
    ));
    catalog.import_library(&library(
        "Collections",
        vec![
            KeywordDoc::new("Get From List", &["list_", "index"], "Returns the value."),
            KeywordDoc::new("Append To List", &["list_", "*values"], "Adds values."),
        ],
    ));
    catalog
}

fn references(catalog: &Catalog, needle: &str) -> Vec<String> {
    catalog
        .search(needle)
        .into_iter()
        .map(|entry| entry.reference.clone())
        .collect()
}

#[test]
fn prefix_query_finds_collections_keywords() {
    let catalog = stdlib_catalog();
    let refs = references(&catalog, "coll");
    assert!(refs.contains(&"Collections.Get From List".to_string()));
    assert!(!refs.contains(&"BuiltIn.Log".to_string()));
}

#[test]
fn empty_needle_returns_nothing() {
    let catalog = stdlib_catalog();
    assert!(catalog.search("").is_empty());
    assert!(catalog.search("   ").is_empty());
}

#[test]
fn results_are_deduplicated() {
    let catalog = stdlib_catalog();
    let refs = references(&catalog, "list");
    let mut unique = refs.clone();
    unique.dedup();
    assert_eq!(refs, unique);
    assert_eq!(refs.len(), 3);
}

#[test]
fn reimport_drops_stale_terms() {
    let mut catalog = stdlib_catalog();
    let doc = KeywordDoc::new("Frobnicate Widget", &[], "");
    let mut aliased = KeywordEntry::new("Custom", &doc, EntrySource::Library);
    aliased.name = "Zebra Crossing".into();
    catalog.upsert(aliased);
    assert_eq!(references(&catalog, "zebra"), vec!["Custom.Frobnicate Widget".to_string()]);

    let mut refreshed = library("Custom", vec![doc]);
    refreshed.keywords[0].doc = "Updated.".into();
    catalog.import_library(&refreshed);

    assert!(references(&catalog, "zebra").is_empty());
    assert_eq!(catalog.get("Custom.Frobnicate Widget").unwrap().doc, "Updated.");
    assert_eq!(catalog.get("Custom.Frobnicate Widget").unwrap().name, "Frobnicate Widget");
    assert_eq!(references(&catalog, "frobnicate").len(), 1);
    assert_eq!(catalog.len(), 6);
}

#[test]
fn misspelled_needles_fall_back_to_fuzzy() {
    let catalog = stdlib_catalog();
    let refs = references(&catalog, "apend");
    assert_eq!(refs, vec!["Collections.Append To List".to_string()]);
    assert!(references(&catalog, "lgo").is_empty());
}

#[test]
fn suite_keywords_are_qualified_by_suite_name() {
    let mut suite = Suite::new("Robocode Lab", ".");
    let mut defaults = TestDefaults::default();
    populate_suite(
        "*** Keywords ***\nHead\n    [Arguments]  ${list}\n    No Operation\n",
        &mut suite,
        &mut defaults,
    )
    .unwrap();

    let mut catalog = stdlib_catalog();
    catalog.import_from_suite(&suite);
    let entry = catalog.lookup("head").unwrap();
    assert_eq!(entry.reference, "Robocode Lab.Head");
    assert_eq!(entry.source, EntrySource::Suite);
    assert_eq!(references(&catalog, "hea"), vec!["Robocode Lab.Head".to_string()]);
}
