//! JSON-lines request loop: one request per input line, frontend messages
//! and the reply written one JSON object per output line.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use parking_lot::Mutex;
use robotkernel_kernel::{
    BusFrontend, CellMetadata, CompleteReply, ExecuteReply, FrontendMessage, InspectReply, Session,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::{error::TryRecvError, Receiver};
use tracing::{debug, info, warn};

use super::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Frontend messages buffered per request before older ones are dropped
    #[arg(long, default_value_t = 1024)]
    pub buffer: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Execute {
        code: String,
        #[serde(default)]
        silent: bool,
        #[serde(default)]
        metadata: CellMetadata,
    },
    Complete {
        code: String,
        #[serde(default)]
        cursor_pos: Option<usize>,
    },
    Inspect {
        code: String,
        #[serde(default)]
        cursor_pos: Option<usize>,
    },
    InvokeTrigger {
        name: String,
        #[serde(default)]
        values: HashMap<String, String>,
    },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Message { message: FrontendMessage },
    ExecuteReply { content: ExecuteReply },
    CompleteReply { content: CompleteReply },
    InspectReply { content: InspectReply },
    ShutdownReply { closed: usize },
    BadRequest { error: String },
}

pub async fn cmd_serve(args: ServeArgs, ctx: &CliContext) -> Result<()> {
    let frontend = Arc::new(BusFrontend::new(args.buffer));
    let messages = frontend.subscribe();
    let session = Arc::new(Mutex::new(ctx.session(frontend)));

    info!("serving JSON-lines requests on stdio");
    let mut stdout = tokio::io::stdout();
    serve_lines(
        Arc::clone(&session),
        messages,
        BufReader::new(tokio::io::stdin()),
        &mut stdout,
    )
    .await
}

/// Handles requests until `shutdown` or end of input. Input ending without
/// a shutdown request still closes the session's connections.
pub async fn serve_lines<R, W>(
    session: Arc<Mutex<Session>>,
    mut messages: Receiver<FrontendMessage>,
    reader: R,
    writer: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("reading request")? {
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "malformed request");
                write_line(writer, &Response::BadRequest { error: err.to_string() }).await?;
                continue;
            }
        };
        let shutdown = matches!(request, Request::Shutdown);

        let worker = Arc::clone(&session);
        let response = tokio::task::spawn_blocking(move || handle(&mut worker.lock(), request))
            .await
            .context("request handler panicked")?;

        loop {
            match messages.try_recv() {
                Ok(message) => write_line(writer, &Response::Message { message }).await?,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "frontend messages dropped; raise --buffer");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        write_line(writer, &response).await?;
        if shutdown {
            return Ok(());
        }
    }

    let closed = tokio::task::spawn_blocking(move || session.lock().shutdown())
        .await
        .context("shutdown panicked")?;
    debug!(closed, "input closed; session shut down");
    Ok(())
}

fn handle(session: &mut Session, request: Request) -> Response {
    match request {
        Request::Execute {
            code,
            silent,
            metadata,
        } => {
            session.init_metadata(&metadata);
            Response::ExecuteReply {
                content: session.execute(&code, silent),
            }
        }
        Request::Complete { code, cursor_pos } => Response::CompleteReply {
            content: session.complete(&code, cursor_pos),
        },
        Request::Inspect { code, cursor_pos } => Response::InspectReply {
            content: session.inspect(&code, cursor_pos),
        },
        Request::InvokeTrigger { name, values } => Response::ExecuteReply {
            content: session.invoke_trigger(&name, &values),
        },
        Request::Shutdown => Response::ShutdownReply {
            closed: session.shutdown(),
        },
    }
}

async fn write_line<W>(writer: &mut W, response: &Response) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(response)?;
    line.push(b'\n');
    writer.write_all(&line).await.context("writing response")?;
    writer.flush().await.context("flushing response")?;
    Ok(())
}
