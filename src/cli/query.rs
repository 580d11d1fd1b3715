use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use robotkernel_kernel::{RecordingFrontend, Session};
use tracing::debug;

use super::cells::read_cell_file;
use super::context::CliContext;
use super::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct QueryArgs {
    /// Text of the cell being edited
    pub code: String,

    /// Cursor position in characters; the end of the text when omitted
    #[arg(long)]
    pub cursor: Option<usize>,

    /// Cell files executed silently first, so their keywords and variables
    /// are known
    #[arg(long = "setup", value_name = "FILE")]
    pub setup: Vec<PathBuf>,
}

pub async fn cmd_complete(args: QueryArgs, ctx: &CliContext, output: &OutputFormat) -> Result<()> {
    let session = prepared_session(&args, ctx).await?;
    let reply = session.complete(&args.code, args.cursor);
    output.print(&reply, || reply.matches.join("\n"))
}

pub async fn cmd_inspect(args: QueryArgs, ctx: &CliContext, output: &OutputFormat) -> Result<()> {
    let session = prepared_session(&args, ctx).await?;
    let reply = session.inspect(&args.code, args.cursor);
    output.print(&reply, || {
        reply
            .data
            .get("text/plain")
            .and_then(|value| value.as_str())
            .unwrap_or("(not found)")
            .to_string()
    })
}

async fn prepared_session(args: &QueryArgs, ctx: &CliContext) -> Result<Session> {
    let mut session = ctx.session(Arc::new(RecordingFrontend::new()));
    for path in &args.setup {
        for cell in read_cell_file(path).await? {
            let reply = session.execute(&cell.source, true);
            debug!(cell = %cell.id, ok = reply.is_ok(), "setup cell executed");
        }
    }
    Ok(session)
}
