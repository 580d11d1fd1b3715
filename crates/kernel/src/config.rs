use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{KernelError, KernelResult};

pub const DEFAULT_SUITE_NAME: &str = "Robocode Lab";

/// Session settings, usually read from `config/robotkernel.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub suite_name: String,
    /// Libraries whose keywords are in the catalog before the first cell.
    pub libraries: Vec<String>,
    pub completion: CompletionConfig,
    pub artifacts: ArtifactConfig,
    /// Parent of the per-run scratch directories; the system temp dir when unset.
    pub scratch_root: Option<PathBuf>,
    pub log_level: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Maximum number of keyword candidates; zero keeps all of them.
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub embed_images: bool,
    pub max_image_width: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            suite_name: DEFAULT_SUITE_NAME.to_string(),
            libraries: vec!["BuiltIn".to_string()],
            completion: CompletionConfig::default(),
            artifacts: ArtifactConfig::default(),
            scratch_root: None,
            log_level: "info".to_string(),
        }
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            embed_images: true,
            max_image_width: 800,
        }
    }
}

impl KernelConfig {
    pub fn from_yaml(raw: &str) -> KernelResult<Self> {
        let config: Self =
            serde_yaml::from_str(raw).map_err(|err| KernelError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> KernelResult<String> {
        serde_yaml::to_string(self).map_err(|err| KernelError::Config(err.to_string()))
    }

    pub fn validate(&self) -> KernelResult<()> {
        if self.suite_name.trim().is_empty() {
            return Err(KernelError::Config("suite_name must not be empty".into()));
        }
        if self.artifacts.max_image_width == 0 {
            return Err(KernelError::Config(
                "artifacts.max_image_width must be positive".into(),
            ));
        }
        if !matches!(
            self.log_level.to_ascii_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(KernelError::Config(format!(
                "unknown log_level '{}'",
                self.log_level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = KernelConfig::from_yaml("completion:\n  limit: 20\n").unwrap();
        assert_eq!(config.completion.limit, 20);
        assert_eq!(config.suite_name, DEFAULT_SUITE_NAME);
        assert!(config.artifacts.embed_images);
        assert_eq!(config.artifacts.max_image_width, 800);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(KernelConfig::from_yaml("suite_name: ''\n").is_err());
        assert!(KernelConfig::from_yaml("log_level: loud\n").is_err());
        assert!(KernelConfig::from_yaml("artifacts: [1, 2]\n").is_err());
    }

    #[test]
    fn yaml_round_trip() {
        let config = KernelConfig {
            libraries: vec!["BuiltIn".into(), "Collections".into()],
            ..KernelConfig::default()
        };
        let parsed = KernelConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
