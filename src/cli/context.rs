use std::path::{Path, PathBuf};
use std::sync::Arc;

use robotkernel_engine::Interpreter;
use robotkernel_kernel::{Frontend, KernelConfig, Session};

pub struct CliContext {
    config: Arc<KernelConfig>,
    config_path: PathBuf,
}

impl CliContext {
    pub fn new(config: KernelConfig, config_path: PathBuf) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
        }
    }

    pub fn config(&self) -> &KernelConfig {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// A fresh session on the reference engine.
    pub fn session(&self, frontend: Arc<dyn Frontend>) -> Session {
        Session::new(
            self.config.as_ref().clone(),
            Arc::new(Interpreter::new()),
            frontend,
        )
    }
}
