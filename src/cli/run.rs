use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Args;
use robotkernel_kernel::{CellMetadata, ExecuteReply, FrontendMessage, RecordingFrontend};
use serde::Serialize;
use tracing::{info, warn};

use super::cells::read_cell_file;
use super::context::CliContext;
use super::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Cell files to execute, in order, through one session
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Do not publish results, progress or errors
    #[arg(long)]
    pub silent: bool,

    /// Stop at the first cell that fails
    #[arg(long)]
    pub fail_fast: bool,
}

#[derive(Debug, Serialize)]
pub struct CellOutcome {
    pub cell: String,
    pub reply: ExecuteReply,
    pub messages: Vec<FrontendMessage>,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext, output: &OutputFormat) -> Result<()> {
    let frontend = Arc::new(RecordingFrontend::new());
    let mut session = ctx.session(frontend.clone());
    let mut executed = 0usize;
    let mut failed = 0usize;

    'files: for path in &args.files {
        let cells = read_cell_file(path).await?;
        info!(file = %path.display(), cells = cells.len(), "running cell file");
        for cell in cells {
            session.init_metadata(&CellMetadata {
                cell_id: Some(cell.id.clone()),
                deleted_cells: Vec::new(),
            });
            let reply = session.execute(&cell.source, args.silent);
            executed += 1;
            let outcome = CellOutcome {
                cell: cell.id,
                messages: frontend.take(),
                reply,
            };
            output.print(&outcome, || render_outcome(&outcome))?;
            if !outcome.reply.is_ok() {
                failed += 1;
                if args.fail_fast {
                    warn!(cell = %outcome.cell, "stopping at failed cell");
                    break 'files;
                }
            }
        }
    }

    let closed = session.shutdown();
    info!(executed, failed, closed, "run finished");
    if failed > 0 {
        bail!("{failed} of {executed} cells failed");
    }
    Ok(())
}

fn render_outcome(outcome: &CellOutcome) -> String {
    let mut lines = Vec::new();
    match &outcome.reply {
        ExecuteReply::Ok { execution_count } => {
            lines.push(format!("[{execution_count}] {}: ok", outcome.cell));
        }
        ExecuteReply::Error { ename, evalue, .. } if ename.is_empty() => {
            lines.push(format!("[!] {}: failed {evalue}", outcome.cell).trim_end().to_string());
        }
        ExecuteReply::Error { ename, evalue, .. } => {
            lines.push(format!("[!] {}: {ename}: {evalue}", outcome.cell));
        }
    }
    for message in &outcome.messages {
        match message {
            FrontendMessage::ExecuteResult {
                execution_count,
                data,
                ..
            } => {
                let text = data
                    .get("text/plain")
                    .and_then(|value| value.as_str())
                    .unwrap_or_default();
                lines.push(format!("Out[{execution_count}]: {text}"));
            }
            FrontendMessage::Error { traceback, .. } => {
                lines.extend(traceback.iter().map(|line| format!("  {line}")));
            }
            FrontendMessage::DisplayData { data, .. } => {
                let mimes: Vec<&str> = data.keys().map(String::as_str).collect();
                lines.push(format!("  <display {}>", mimes.join(", ")));
            }
            FrontendMessage::UpdateDisplayData { .. } => {}
        }
    }
    lines.join("\n")
}
