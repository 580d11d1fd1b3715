pub mod ast;
pub mod builder;
pub mod errors;
pub mod model;
pub mod parser;
pub mod validate;

pub use builder::{populate_suite, populate_suite_with, rpa_mode, MergeOutcome};
pub use errors::{DataError, DataResult};
pub use model::{
    is_variable, strip_duplicates, variable_key, Import, ImportKind, Named, Resource, Step, Suite,
    TestDefaults, TestItem, UserKeyword, VariableDef,
};
pub use parser::{split_cells, PlainTextParser, UnitParser};
pub use validate::ErrorReporter;
