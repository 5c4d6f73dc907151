//! Error types for apiscout.
//!
//! Library crates use [`ApiScoutError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all apiscout operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiScoutError {
    /// Configuration loading or validation error. Fatal at startup.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP transport error (timeout, connection refused, body read).
    #[error("network error: {0}")]
    Network(String),

    /// Malformed structured data: HTML, JSON, robots rules, tool records.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Cache database error.
    #[error("storage error: {0}")]
    Storage(String),

    /// The structured-extraction capability failed or returned garbage.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Headless browser failed to launch, timed out, or exited non-zero.
    #[error("render error: {0}")]
    Render(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid input (bad base URL, unknown namespace, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ApiScoutError>;

impl ApiScoutError {
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
        let err = ApiScoutError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = ApiScoutError::parse("unexpected token at line 3");
        assert!(err.to_string().contains("line 3"));
    }
}
