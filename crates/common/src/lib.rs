//! SiteCheck Common Library
//!
//! Data model, configuration and error types shared by the link auditor,
//! the input fuzz harness and the command-line runner.

pub mod config;
pub mod error;
pub mod types;

pub use config::{HarnessConfig, Locator, Target};
pub use error::{Error, Result};
pub use types::*;

/// SiteCheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default config file location, relative to the working directory
pub fn default_config_path() -> std::path::PathBuf {
    std::path::PathBuf::from("sitecheck.toml")
}
