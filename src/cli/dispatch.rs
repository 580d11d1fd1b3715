use super::config::cmd_config;
use super::env::CliArgs;
use super::info::cmd_info;
use super::query::{cmd_complete, cmd_inspect};
use super::run::cmd_run;
use super::serve::cmd_serve;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Run(args) => cmd_run(args, ctx, &cli.output).await,
        Commands::Complete(args) => cmd_complete(args, ctx, &cli.output).await,
        Commands::Inspect(args) => cmd_inspect(args, ctx, &cli.output).await,
        Commands::Serve(args) => cmd_serve(args, ctx).await,
        Commands::Config(args) => cmd_config(args, ctx).await,
        Commands::Info => cmd_info(ctx).await,
    }
}
