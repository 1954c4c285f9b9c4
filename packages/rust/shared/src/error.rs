//! Error types for PlanAid.
//!
//! Library crates use [`PlanAidError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all PlanAid operations.
#[derive(Debug, thiserror::Error)]
pub enum PlanAidError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during an edition lookup or download.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed input data (CSV, JSON, edition metadata).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (missing table, unusable artifact, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Archive (zip) extraction error.
    #[error("archive error: {0}")]
    Archive(String),

    /// Document text extraction error.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Cache registry or cached-artifact error.
    #[error("cache error: {0}")]
    Cache(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PlanAidError>;

impl PlanAidError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = PlanAidError::config("unknown policy key");
        assert_eq!(err.to_string(), "config error: unknown policy key");

        let err = PlanAidError::validation("APT_BASE.csv has no ICAO_ID column");
        assert!(err.to_string().contains("ICAO_ID"));

        let err = PlanAidError::io(
            "/tmp/missing.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("missing.csv"));
    }
}
