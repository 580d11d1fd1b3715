//! One run of the accumulated suite: engine execution with listeners,
//! error/result replies, artifact reduction and the log button.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as Base64, Engine as _};
use robotkernel_core_types::{DisplayId, Value};
use robotkernel_engine::{Engine, RunOptions, Statistics, LOG_FILE};
use robotkernel_event_bus::{Listener, ListenerSet, StatusEvent};
use robotkernel_suite::Suite;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::artifacts::{finalize_log, ArtifactReducer, ReductionReport};
use crate::errors::{KernelError, KernelResult};
use crate::frontend::{bundle, Frontend, MimeBundle};
use crate::listeners::{ReturnValueListener, ReturnValues, StatusEventListener};
use crate::progress::ProgressUpdater;
use crate::render::{log_button, to_mime_and_metadata};
use crate::reply::ExecuteReply;

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub silent: bool,
    pub display_id: DisplayId,
    /// Trigger invocations: no progress element, the log button is shown
    /// as a new element.
    pub adhoc: bool,
}

impl RunRequest {
    pub fn new(silent: bool) -> Self {
        Self {
            silent,
            display_id: DisplayId::new(),
            adhoc: false,
        }
    }

    pub fn adhoc(silent: bool, display_id: DisplayId) -> Self {
        Self {
            silent,
            display_id,
            adhoc: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub reply: ExecuteReply,
    pub statistics: Statistics,
    pub stdout: String,
    pub return_values: Vec<Value>,
    /// Result log inside the scratch directory.
    pub output: PathBuf,
    /// Rendered HTML log with the report link removed.
    pub log: Vec<u8>,
    pub reduction: ReductionReport,
}

pub struct ExecutionPipeline<'a> {
    engine: &'a dyn Engine,
    frontend: &'a Arc<dyn Frontend>,
    reducer: &'a ArtifactReducer,
    listeners: &'a ListenerSet,
    execution_count: u64,
}

impl<'a> ExecutionPipeline<'a> {
    pub fn new(
        engine: &'a dyn Engine,
        frontend: &'a Arc<dyn Frontend>,
        reducer: &'a ArtifactReducer,
        listeners: &'a ListenerSet,
        execution_count: u64,
    ) -> Self {
        Self {
            engine,
            frontend,
            reducer,
            listeners,
            execution_count,
        }
    }

    /// Runs inside a fresh scratch directory that is removed afterwards.
    pub fn execute(
        &self,
        suite: &Suite,
        request: &RunRequest,
        scratch_root: Option<&Path>,
    ) -> KernelResult<RunResult> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("robotkernel-");
        let dir = match scratch_root {
            Some(root) => {
                fs::create_dir_all(root).map_err(KernelError::Scratch)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(KernelError::Scratch)?;

        let result = self.run(suite, request, dir.path());
        let path = dir.path().to_path_buf();
        if let Err(err) = dir.close() {
            debug!(path = %path.display(), error = %err, "scratch directory not removed");
        }
        result
    }

    pub fn run(
        &self,
        suite: &Suite,
        request: &RunRequest,
        scratch_dir: &Path,
    ) -> KernelResult<RunResult> {
        let silent = request.silent;
        let return_values = ReturnValues::new();
        let mut extra = Vec::new();
        if !(silent || request.adhoc) {
            let progress = ProgressUpdater::new(Arc::clone(self.frontend), request.display_id.clone());
            extra.push(Listener::Status(Arc::new(StatusEventListener::new(Arc::new(
                move |event: &StatusEvent| progress.update(event),
            )))));
        }
        if !silent {
            extra.push(Listener::ReturnValue(Arc::new(ReturnValueListener::new(
                return_values.clone(),
            ))));
        }
        let listeners = self.listeners.extended(extra);

        info!(
            suite = %suite.name,
            items = suite.tests.len(),
            listeners = listeners.len(),
            "starting run"
        );
        let mut console = Vec::new();
        let outcome = self.engine.run(
            suite,
            &RunOptions::new(scratch_dir),
            &listeners,
            &mut console,
        )?;
        let stdout = String::from_utf8_lossy(&console).into_owned();
        let traceback: Vec<String> = stdout.lines().map(str::to_string).collect();
        let failed = !outcome.statistics.is_success();

        if failed {
            if !silent {
                self.frontend.send_error("", "", traceback.clone());
            }
        } else if !silent {
            if let Some(value) = return_values.last().filter(Value::is_renderable) {
                let (data, metadata) = to_mime_and_metadata(&value);
                if !data.is_empty() {
                    self.frontend
                        .send_execute_result(self.execution_count, data, metadata);
                }
            }
        }

        let reduction = match self.reducer.reduce(&outcome.output, scratch_dir) {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "artifact reduction failed");
                ReductionReport::default()
            }
        };
        if !silent {
            for image in &reduction.images {
                let mut metadata = MimeBundle::new();
                metadata.insert(
                    image.mime.clone(),
                    json!({"height": image.height, "width": image.width}),
                );
                self.frontend.send_display_data(
                    bundle(&image.mime, Base64.encode(&image.data)),
                    metadata,
                    None,
                );
            }
        }

        let log_path = scratch_dir.join(LOG_FILE);
        self.engine.write_log(
            &outcome.output,
            &log_path,
            &suite.name,
            suite.rpa.is_tasks(),
        )?;
        let log = finalize_log(&log_path)?;

        if !silent {
            let button = bundle("text/html", log_button(&log, LOG_FILE));
            if request.adhoc {
                self.frontend
                    .send_display_data(button, MimeBundle::new(), Some(&request.display_id));
            } else {
                self.frontend
                    .send_update_display_data(button, MimeBundle::new(), &request.display_id);
            }
        }

        let reply = if failed {
            ExecuteReply::failed_run(traceback)
        } else {
            ExecuteReply::ok(self.execution_count)
        };
        info!(
            summary = %outcome.statistics.summary(),
            images = reduction.images.len(),
            "run complete"
        );
        Ok(RunResult {
            reply,
            statistics: outcome.statistics,
            stdout,
            return_values: return_values.to_vec(),
            output: outcome.output,
            log,
            reduction,
        })
    }
}
