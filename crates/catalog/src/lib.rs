//! Keyword catalog with an incremental search index, fuzzy ranking and the
//! variable history used for completion.

pub mod catalog;
pub mod index;
pub mod scoring;
pub mod variables;

pub use catalog::{Catalog, CatalogHandle, EntrySource, KeywordEntry};
pub use index::{Query, SearchHit, SearchIndex};
pub use scoring::{fuzzy_score, scored_results};
pub use variables::{find_variables, VariableHistory};
