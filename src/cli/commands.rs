use clap::Subcommand;

use super::config::ConfigArgs;
use super::query::QueryArgs;
use super::run::RunArgs;
use super::serve::ServeArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Execute cell files through one session
    Run(RunArgs),

    /// Complete the text at the cursor
    Complete(QueryArgs),

    /// Show documentation for the keyword at the cursor
    Inspect(QueryArgs),

    /// Serve JSON-lines requests on stdin/stdout
    Serve(ServeArgs),

    /// Manage robotkernel configuration
    Config(ConfigArgs),

    /// Show build information and available libraries
    Info,
}
