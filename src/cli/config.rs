use std::path::Path;

use crate::cli::context::CliContext;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use robotkernel_kernel::KernelConfig;
use tokio::fs;
use tracing::info;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Validate the configuration file
    Validate,

    /// Write the default configuration to the configuration path
    Reset,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let path = ctx.config_path().to_path_buf();
    match args.action {
        ConfigAction::Show => {
            println!("Current configuration ({}):", path.display());
            print!("{}", ctx.config().to_yaml()?);
        }
        ConfigAction::Validate => {
            if fs::try_exists(&path).await? {
                let raw = fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                KernelConfig::from_yaml(&raw)
                    .with_context(|| format!("validating {}", path.display()))?;
                println!("Configuration file {} is valid", path.display());
            } else {
                println!(
                    "No configuration file at {}; defaults are valid",
                    path.display()
                );
            }
        }
        ConfigAction::Reset => {
            save_config_file(&path, &KernelConfig::default()).await?;
            info!("Configuration reset at {}", path.display());
            println!(
                "Configuration reset to defaults and written to {}",
                path.display()
            );
        }
    }

    Ok(())
}

async fn save_config_file(path: &Path, config: &KernelConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, config.to_yaml()?)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
