use std::path::PathBuf;

use anyhow::{Context, Result};
use robotkernel_kernel::KernelConfig;
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber. Logs go to stderr; stdout carries replies.
pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

pub struct LoadedConfig {
    pub config: KernelConfig,
    pub path: PathBuf,
    /// False when the defaults were used because no file exists.
    pub found: bool,
}

impl LoadedConfig {
    pub fn report(&self) {
        if self.found {
            info!("Loaded configuration from: {}", self.path.display());
        } else {
            warn!(
                "Config file not found, using defaults: {}",
                self.path.display()
            );
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    // Priority: ./config/robotkernel.yaml > ~/.config/robotkernel/config.yaml
    let local_config = PathBuf::from("config/robotkernel.yaml");
    if local_config.exists() {
        return Ok(local_config);
    }
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push("robotkernel");
    path.push("config.yaml");
    Ok(path)
}

/// Reads the configuration. Runs before logging is installed, so the
/// outcome is reported separately through [`LoadedConfig::report`].
pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let config_path = match config_path {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };

    if fs::try_exists(&config_path).await.unwrap_or(false) {
        let content = fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        let config = KernelConfig::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;

        Ok(LoadedConfig {
            config,
            path: config_path,
            found: true,
        })
    } else {
        Ok(LoadedConfig {
            config: KernelConfig::default(),
            path: config_path,
            found: false,
        })
    }
}
