//! Reference automation engine: runs an accumulated suite with the
//! `BuiltIn`, `Collections` and `String` libraries, reports progress to
//! execution listeners and writes `output.xml` and `log.html`.

mod console;
pub mod errors;
pub mod interpreter;
pub mod library;
pub mod output;
pub mod result;
mod runner;
pub mod stdlib;
pub mod variables;

pub use errors::{EngineError, EngineResult, KeywordFailure, KeywordResult};
pub use interpreter::{Engine, Interpreter, RunOptions, RunOutcome, LOG_FILE, OUTPUT_FILE};
pub use library::{is_truthy, CallContext, KeywordFn, Library, LibraryKeyword, LibraryRegistry};
pub use result::{BodyItem, KeywordRecord, Message, Statistics, SuiteRecord, TestRecord};
pub use variables::VariableStore;
