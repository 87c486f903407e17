//! CLI Commands

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use tracing::debug;

use sitecheck_common::HarnessConfig;

use crate::output::OutputFormat;

pub mod check;
pub mod init;
pub mod links;
pub mod list;
pub mod run;

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub config_path: PathBuf,
    pub format: OutputFormat,
}

impl Context {
    pub fn new(config_path: Option<PathBuf>, format: OutputFormat) -> Self {
        Self {
            config_path: config_path.unwrap_or_else(sitecheck_common::default_config_path),
            format,
        }
    }

    /// Harness config from `--config`, defaults when the file is absent
    pub fn load_config(&self) -> Result<HarnessConfig> {
        debug!("Loading config from {}", self.config_path.display());
        HarnessConfig::load(&self.config_path)
            .with_context(|| format!("loading {}", self.config_path.display()))
    }
}

/// Scenario directory flag shared by `run`, `links` and `list`
pub fn scenarios_dir(dir: &Option<PathBuf>) -> Result<Option<PathBuf>> {
    match dir {
        Some(dir) if !Path::new(dir).is_dir() => {
            anyhow::bail!("scenario directory not found: {}", dir.display())
        }
        other => Ok(other.clone()),
    }
}
