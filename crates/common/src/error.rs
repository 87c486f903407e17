//! Error types for SiteCheck

use thiserror::Error;

/// Result type alias using SiteCheck Error
pub type Result<T> = std::result::Result<T, Error>;

/// SiteCheck error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_errors_convert() {
        let parsed: std::result::Result<toml::Table, _> = toml::from_str("base_url = ");
        let err: Error = parsed.unwrap_err().into();
        assert!(matches!(err, Error::TomlParse(_)));
        assert!(err.to_string().starts_with("TOML parse error"));
    }

    #[test]
    fn test_invalid_url_display() {
        let err = Error::InvalidUrl {
            url: "/menu/".to_string(),
            reason: "relative URL without a base".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid URL '/menu/': relative URL without a base");
    }
}
