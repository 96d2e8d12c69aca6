//! Error types for Bindery.
//!
//! Library crates use [`BinderyError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Bindery operations.
#[derive(Debug, thiserror::Error)]
pub enum BinderyError {
    /// `bindery.toml` could not be loaded or written.
    #[error("config error: {message}")]
    Config { message: String },

    /// The package manifest is missing or is not well-formed.
    #[error("manifest error at {path:?}: {message}")]
    Manifest { path: PathBuf, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An external tool (converter, renderer) could not run or exited non-zero.
    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    /// Data validation error (bad rewrite base, output path without a file name).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Result alias for every Bindery library call.
pub type Result<T> = std::result::Result<T, BinderyError>;

impl BinderyError {
    /// Config error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a manifest error for the given package path.
    pub fn manifest(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create an external tool error.
    pub fn tool(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    /// Validation error with the given message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// I/O error tagged with the path it happened at.
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
    fn messages_name_the_failing_part() {
        let err = BinderyError::config("unknown field `pathz`");
        assert_eq!(err.to_string(), "config error: unknown field `pathz`");

        let err = BinderyError::tool("pandoc", "exit status 64");
        assert_eq!(err.to_string(), "pandoc failed: exit status 64");

        let err = BinderyError::manifest("pub/OEBPS/content.opf", "no <package> root element");
        assert!(err.to_string().contains("content.opf"));
        assert!(err.to_string().contains("no <package> root element"));
    }
}
