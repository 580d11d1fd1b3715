use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Prints a structured value; `human` falls back to `render`.
    pub fn print<T: Serialize>(&self, value: &T, render: impl FnOnce() -> String) -> Result<()> {
        match self {
            Self::Human => println!("{}", render()),
            Self::Json => println!("{}", serde_json::to_string(value)?),
            Self::Yaml => print!("{}", serde_yaml::to_string(value)?),
        }
        Ok(())
    }
}
