//! The notebook session: owns the accumulated suite, the keyword catalog and
//! every piece of cross-cell state, and implements the host-facing
//! operations.

use std::collections::HashMap;
use std::iter;
use std::path::PathBuf;
use std::sync::Arc;

use robotkernel_catalog::{Catalog, CatalogHandle, VariableHistory};
use robotkernel_core_types::{normalize_name, CellId, DisplayId, RpaMode, Value};
use robotkernel_engine::Engine;
use robotkernel_event_bus::{Listener, ListenerSet};
use robotkernel_suite::{populate_suite, Suite, TestDefaults};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifacts::ArtifactReducer;
use crate::completion::{Resolver, SelectorRecognizer};
use crate::config::KernelConfig;
use crate::errors::{KernelError, KernelResult};
use crate::evaluation::{parse_module_magic, Evaluator, ModuleRegistry};
use crate::frontend::Frontend;
use crate::interactive::{new_keywords, KeywordTrigger};
use crate::listeners::{
    ConnectionRegistry, ConnectionsListener, KeywordsIndexer, SuiteVariables, VariablesListener,
};
use crate::pipeline::{ExecutionPipeline, RunRequest, RunResult};
use crate::render::to_mime_and_metadata;
use crate::reply::{CompleteReply, ExecuteReply, InspectReply};

/// Cell metadata the host attaches to an execute request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellMetadata {
    #[serde(rename = "cellId", default, skip_serializing_if = "Option::is_none")]
    pub cell_id: Option<String>,
    #[serde(rename = "deletedCells", default)]
    pub deleted_cells: Vec<String>,
}

pub struct Session {
    config: KernelConfig,
    engine: Arc<dyn Engine>,
    frontend: Arc<dyn Frontend>,
    reducer: ArtifactReducer,
    suite: Suite,
    defaults: TestDefaults,
    catalog: CatalogHandle,
    /// Successfully executed cells in execution order.
    history: Vec<(CellId, String)>,
    cell: Option<CellId>,
    variables: VariableHistory,
    suite_variables: SuiteVariables,
    connections: ConnectionRegistry,
    connection_kinds: Vec<String>,
    recognizers: Vec<Arc<dyn SelectorRecognizer>>,
    modules: ModuleRegistry,
    triggers: HashMap<String, KeywordTrigger>,
    execution_count: u64,
    last_run: Option<RunResult>,
}

impl Session {
    pub fn new(config: KernelConfig, engine: Arc<dyn Engine>, frontend: Arc<dyn Frontend>) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let mut catalog = Catalog::new();
        catalog.set_available_libraries(engine.available_libraries());
        for name in &config.libraries {
            match engine.library_doc(name) {
                Ok(doc) => {
                    catalog.import_library(&doc);
                }
                Err(err) => warn!(library = %name, error = %err, "preloading library failed"),
            }
        }
        info!(
            suite = %config.suite_name,
            keywords = catalog.len(),
            libraries = catalog.libraries().len(),
            "session started"
        );

        Self {
            reducer: ArtifactReducer::new(config.artifacts.clone(), cwd.clone()),
            suite: Suite::new(config.suite_name.clone(), cwd),
            defaults: TestDefaults::default(),
            catalog: CatalogHandle::new_with(catalog),
            history: Vec::new(),
            cell: None,
            variables: VariableHistory::new(),
            suite_variables: SuiteVariables::new(),
            connections: ConnectionRegistry::new(),
            connection_kinds: Vec::new(),
            recognizers: Vec::new(),
            modules: ModuleRegistry::new(),
            triggers: HashMap::new(),
            execution_count: 0,
            last_run: None,
            config,
            engine,
            frontend,
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn suite(&self) -> &Suite {
        &self.suite
    }

    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    pub fn execution_count(&self) -> u64 {
        self.execution_count
    }

    pub fn variable_history(&self) -> &VariableHistory {
        &self.variables
    }

    pub fn suite_variables(&self) -> &SuiteVariables {
        &self.suite_variables
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn last_run(&self) -> Option<&RunResult> {
        self.last_run.as_ref()
    }

    pub fn history(&self) -> impl Iterator<Item = (&CellId, &str)> {
        self.history.iter().map(|(id, code)| (id, code.as_str()))
    }

    pub fn trigger(&self, name: &str) -> Option<&KeywordTrigger> {
        self.triggers.get(&normalize_name(name))
    }

    pub fn triggers(&self) -> impl Iterator<Item = &KeywordTrigger> {
        self.triggers.values()
    }

    pub fn set_evaluator(&mut self, evaluator: Arc<dyn Evaluator>) {
        self.modules.set_evaluator(evaluator);
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    /// Registers a selector recognizer and tracks the connection kinds it
    /// completes against.
    pub fn add_recognizer(&mut self, recognizer: Arc<dyn SelectorRecognizer>) {
        for kind in recognizer.connection_kinds() {
            self.track_connections(kind);
        }
        self.recognizers.push(recognizer);
    }

    /// Records connections of `kind` opened by later runs.
    pub fn track_connections(&mut self, kind: &str) {
        if !self.connection_kinds.iter().any(|known| known == kind) {
            self.connection_kinds.push(kind.to_string());
        }
    }

    /// Applies host metadata ahead of the next `execute`.
    pub fn init_metadata(&mut self, metadata: &CellMetadata) {
        self.cell = metadata.cell_id.clone().map(CellId);
        if metadata.deleted_cells.is_empty() {
            return;
        }
        let before = self.history.len();
        self.history
            .retain(|(id, _)| !metadata.deleted_cells.iter().any(|deleted| *deleted == id.0));
        debug!(
            removed = before - self.history.len(),
            "dropped deleted cells from history"
        );
    }

    pub fn execute(&mut self, code: &str, silent: bool) -> ExecuteReply {
        self.execution_count += 1;
        let cell = self.cell.take().unwrap_or_default();
        self.resolver_clear_highlights();

        let result = match parse_module_magic(code) {
            Some((module, body)) => self.evaluate_module(module, body, silent),
            None => self.run_cell(code, silent).map(|reply| {
                if reply.is_ok() {
                    self.remember(cell, code);
                }
                reply
            }),
        };
        self.suite.clear_tests();

        match result {
            Ok(reply) => reply,
            Err(err) => {
                warn!(ename = err.ename(), error = %err, "cell failed");
                if !silent {
                    self.frontend
                        .send_error(err.ename(), &err.to_string(), err.traceback(code));
                }
                ExecuteReply::from_error(&err, code)
            }
        }
    }

    pub fn complete(&self, code: &str, cursor: Option<usize>) -> CompleteReply {
        let catalog = self.catalog.read();
        self.resolver(&catalog).complete(code, cursor)
    }

    pub fn inspect(&self, code: &str, cursor: Option<usize>) -> InspectReply {
        let catalog = self.catalog.read();
        self.resolver(&catalog).inspect(code, cursor)
    }

    /// Runs a published trigger as its own run on a copy of the suite.
    pub fn invoke_trigger(&mut self, name: &str, values: &HashMap<String, String>) -> ExecuteReply {
        let trigger = self.trigger(name).cloned();
        let result = trigger
            .ok_or_else(|| KernelError::UnknownTrigger(name.to_string()))
            .and_then(|trigger| self.run_trigger(&trigger, values));
        match result {
            Ok(reply) => reply,
            Err(err) => {
                warn!(trigger = name, error = %err, "trigger failed");
                self.frontend
                    .send_error(err.ename(), &err.to_string(), err.traceback(""));
                ExecuteReply::from_error(&err, "")
            }
        }
    }

    /// Closes tracked connections and forgets all cross-cell state. Returns
    /// the number of connections closed.
    pub fn shutdown(&mut self) -> usize {
        let closed = self.connections.close_all();
        self.history.clear();
        self.cell = None;
        self.variables.clear();
        self.suite_variables.clear();
        self.modules.clear();
        self.triggers.clear();
        info!(closed, "session shut down");
        closed
    }

    fn run_cell(&mut self, code: &str, silent: bool) -> KernelResult<ExecuteReply> {
        self.variables = VariableHistory::from_sources(
            self.history
                .iter()
                .map(|(_, source)| source.as_str())
                .chain(iter::once(code)),
        );

        let previous = self.suite.clone();
        let previous_defaults = self.defaults.clone();
        let outcome = populate_suite(code, &mut self.suite, &mut self.defaults)?;
        if let Err(err) = self.import_new_libraries(&previous) {
            self.suite = previous;
            self.defaults = previous_defaults;
            return Err(err);
        }
        debug!(tests = outcome.tests_added, mode = ?outcome.mode, "cell merged");

        let added: Vec<_> = new_keywords(&previous.resource.keywords, &self.suite.resource.keywords)
            .into_iter()
            .cloned()
            .collect();
        self.catalog.write().import_from_suite(&self.suite);

        if !self.suite.has_items() {
            for keyword in &added {
                let trigger = KeywordTrigger::from_keyword(keyword, DisplayId::new());
                if !silent {
                    trigger.publish(self.frontend.as_ref());
                }
                self.triggers.insert(normalize_name(&trigger.name), trigger);
            }
            return Ok(ExecuteReply::ok(self.execution_count));
        }

        let purged = self.suite_variables.purge(
            self.suite
                .resource
                .variables
                .iter()
                .map(|variable| variable.name.as_str()),
        );
        if purged > 0 {
            debug!(purged, "suite definitions replace cached variables");
        }

        let listeners = self.listeners();
        let pipeline = ExecutionPipeline::new(
            self.engine.as_ref(),
            &self.frontend,
            &self.reducer,
            &listeners,
            self.execution_count,
        );
        let run = pipeline.execute(
            &self.suite,
            &RunRequest::new(silent),
            self.config.scratch_root.as_deref(),
        )?;
        let reply = run.reply.clone();
        self.last_run = Some(run);
        Ok(reply)
    }

    fn run_trigger(
        &mut self,
        trigger: &KeywordTrigger,
        values: &HashMap<String, String>,
    ) -> KernelResult<ExecuteReply> {
        let mut suite = self.suite.clone();
        let mut defaults = self.defaults.clone();
        suite.clear_tests();
        populate_suite(&trigger.unit(RpaMode::Tasks, values), &mut suite, &mut defaults)?;

        let listeners = self.listeners();
        let pipeline = ExecutionPipeline::new(
            self.engine.as_ref(),
            &self.frontend,
            &self.reducer,
            &listeners,
            self.execution_count,
        );
        let run = pipeline.execute(
            &suite,
            &RunRequest::adhoc(false, DisplayId::new()),
            self.config.scratch_root.as_deref(),
        )?;
        let reply = run.reply.clone();
        self.last_run = Some(run);
        Ok(reply)
    }

    fn evaluate_module(&mut self, module: &str, body: &str, silent: bool) -> KernelResult<ExecuteReply> {
        let value = self.modules.evaluate(module, body)?;
        if !silent {
            if let Some(value) = value.filter(Value::is_renderable) {
                let (data, metadata) = to_mime_and_metadata(&value);
                if !data.is_empty() {
                    self.frontend
                        .send_execute_result(self.execution_count, data, metadata);
                }
            }
        }
        Ok(ExecuteReply::ok(self.execution_count))
    }

    /// Imports libraries the last merge introduced so that unknown names
    /// fail the cell before anything runs.
    fn import_new_libraries(&self, previous: &Suite) -> KernelResult<()> {
        let known = previous.resource.library_names();
        let added: Vec<String> = self
            .suite
            .resource
            .library_names()
            .into_iter()
            .filter(|name| !known.contains(name))
            .map(str::to_string)
            .collect();
        for name in added {
            let doc = self.engine.library_doc(&name)?;
            self.catalog.write().import_library(&doc);
        }
        Ok(())
    }

    fn remember(&mut self, cell: CellId, code: &str) {
        match self.history.iter_mut().find(|(id, _)| *id == cell) {
            Some((_, source)) => *source = code.to_string(),
            None => self.history.push((cell, code.to_string())),
        }
    }

    fn listeners(&self) -> ListenerSet {
        let mut listeners = vec![
            Listener::Import(Arc::new(KeywordsIndexer::new(self.catalog.clone()))),
            Listener::Variable(Arc::new(VariablesListener::new(self.suite_variables.clone()))),
        ];
        for kind in &self.connection_kinds {
            listeners.push(Listener::Connection(Arc::new(ConnectionsListener::new(
                kind,
                self.connections.clone(),
            ))));
        }
        ListenerSet::new(listeners)
    }

    fn resolver<'a>(&'a self, catalog: &'a Catalog) -> Resolver<'a> {
        Resolver {
            catalog,
            variables: &self.variables,
            connections: &self.connections,
            recognizers: &self.recognizers,
            limit: self.config.completion.limit,
        }
    }

    fn resolver_clear_highlights(&self) {
        if self.recognizers.is_empty() {
            return;
        }
        let catalog = self.catalog.read();
        self.resolver(&catalog).clear_highlights();
    }
}

#[cfg(test)]
mod tests {
    use robotkernel_engine::Interpreter;

    use super::*;
    use crate::frontend::RecordingFrontend;

    fn session() -> (Session, Arc<RecordingFrontend>) {
        let frontend = Arc::new(RecordingFrontend::new());
        let session = Session::new(
            KernelConfig::default(),
            Arc::new(Interpreter::new()),
            frontend.clone(),
        );
        (session, frontend)
    }

    #[test]
    fn metadata_replaces_cells_in_place() {
        let (mut session, _) = session();
        let metadata = CellMetadata {
            cell_id: Some("a".into()),
            deleted_cells: Vec::new(),
        };
        session.init_metadata(&metadata);
        assert!(session.execute("*** Variables ***\n${first}    1\n", true).is_ok());
        session.init_metadata(&metadata);
        assert!(session.execute("*** Variables ***\n${second}    2\n", true).is_ok());
        let cells: Vec<_> = session.history().collect();
        assert_eq!(cells.len(), 1);
        assert!(cells[0].1.contains("${second}"));
    }

    #[test]
    fn metadata_deserializes_host_field_names() {
        let metadata: CellMetadata =
            serde_json::from_str(r#"{"cellId":"c1","deletedCells":["c0"]}"#).unwrap();
        assert_eq!(metadata.cell_id.as_deref(), Some("c1"));
        assert_eq!(metadata.deleted_cells, vec!["c0".to_string()]);
    }

    #[test]
    fn execution_count_grows_on_errors_too() {
        let (mut session, _) = session();
        session.execute("not a section", true);
        session.execute("*** Keywords ***\nNoop\n    No Operation\n", true);
        assert_eq!(session.execution_count(), 2);
    }
}
