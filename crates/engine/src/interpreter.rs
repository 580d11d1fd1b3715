use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use robotkernel_core_types::LibraryDoc;
use robotkernel_event_bus::ListenerSet;
use robotkernel_suite::Suite;
use tracing::info;

use crate::console::ConsoleReport;
use crate::errors::{EngineError, EngineResult};
use crate::library::{Library, LibraryRegistry};
use crate::output;
use crate::result::{timestamp, Statistics, SuiteRecord};
use crate::runner::Runner;

pub const OUTPUT_FILE: &str = "output.xml";
pub const LOG_FILE: &str = "log.html";

#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Directory receiving `output.xml`; created when missing.
    pub output_dir: PathBuf,
}

impl RunOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub statistics: Statistics,
    pub output: PathBuf,
    pub result: SuiteRecord,
}

/// Automation engine executing an accumulated suite.
pub trait Engine: Send + Sync {
    /// Names of libraries that can be imported.
    fn available_libraries(&self) -> Vec<String>;

    fn library_doc(&self, name: &str) -> EngineResult<LibraryDoc>;

    /// Runs the suite's executable items, writing console output to
    /// `console` and the result log into the output directory.
    fn run(
        &self,
        suite: &Suite,
        options: &RunOptions,
        listeners: &ListenerSet,
        console: &mut dyn Write,
    ) -> EngineResult<RunOutcome>;

    /// Renders the HTML log from a result log.
    fn write_log(&self, output: &Path, log: &Path, title: &str, rpa: bool) -> EngineResult<()>;
}

/// Reference engine backed by a [`LibraryRegistry`].
#[derive(Debug)]
pub struct Interpreter {
    registry: RwLock<LibraryRegistry>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Interpreter with the standard libraries registered.
    pub fn new() -> Self {
        Self::with_registry(LibraryRegistry::with_stdlib())
    }

    pub fn with_registry(registry: LibraryRegistry) -> Self {
        Self {
            registry: RwLock::new(registry),
        }
    }

    /// Makes a custom library importable by later runs.
    pub fn register(&self, library: Library) {
        self.registry.write().register(library);
    }
}

impl Engine for Interpreter {
    fn available_libraries(&self) -> Vec<String> {
        self.registry.read().names()
    }

    fn library_doc(&self, name: &str) -> EngineResult<LibraryDoc> {
        self.registry
            .read()
            .get(name)
            .map(|library| library.to_doc())
            .ok_or_else(|| EngineError::import(name, "No library with this name is registered."))
    }

    fn run(
        &self,
        suite: &Suite,
        options: &RunOptions,
        listeners: &ListenerSet,
        console: &mut dyn Write,
    ) -> EngineResult<RunOutcome> {
        fs::create_dir_all(&options.output_dir).map_err(|source| EngineError::Output {
            path: options.output_dir.clone(),
            source,
        })?;
        let registry = self.registry.read().clone();
        let result = Runner::new(suite, &registry, listeners, console, &options.output_dir).run()?;

        let output = options.output_dir.join(OUTPUT_FILE);
        output::write_output(&output, &result, &timestamp())?;
        let _ = ConsoleReport::new(console).output_file("Output:", &output.display().to_string());

        let statistics = result.statistics();
        info!(
            suite = %suite.name,
            total = statistics.total,
            failed = statistics.failed,
            "run finished"
        );
        Ok(RunOutcome {
            statistics,
            output,
            result,
        })
    }

    fn write_log(&self, output: &Path, log: &Path, title: &str, rpa: bool) -> EngineResult<()> {
        output::write_log(output, log, title, rpa)
    }
}
