//! Run bookkeeping: what was assembled, what was skipped, what failed.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};

use bindery_markup::ExtractError;
use bindery_shared::{BinderyError, Result};

/// Why a spine item produced no fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The manifest points at a file that does not exist.
    Missing,
    /// The file exists but could not be read as UTF-8 text.
    Unreadable(String),
    /// The file has no usable content region.
    NoContentRegion(ExtractError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("file not found"),
            Self::Unreadable(e) => write!(f, "unreadable: {e}"),
            Self::NoContentRegion(e) => write!(f, "no content region: {e}"),
        }
    }
}

/// A spine item that was left out of the assembled document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFragment {
    pub href: String,
    pub reason: SkipReason,
}

/// An external tool invocation that failed. Recorded, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    /// Program name as configured.
    pub tool: String,
    /// What it was working on (fragment, image, output file).
    pub subject: String,
    pub message: String,
}

impl ToolFailure {
    /// Build from a [`BinderyError`], keeping the tool name when it has one.
    pub fn from_error(tool: &str, subject: impl Into<String>, err: &BinderyError) -> Self {
        let (tool, message) = match err {
            BinderyError::Tool { tool, message } => (tool.clone(), message.clone()),
            other => (tool.to_string(), other.to_string()),
        };
        Self {
            tool,
            subject: subject.into(),
            message,
        }
    }
}

/// A file written by the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub sha256: String,
}

impl OutputFile {
    /// Read back a written file and fingerprint it.
    pub fn describe(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| BinderyError::io(path, e))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);

        Ok(Self {
            path: path.to_path_buf(),
            size_bytes: bytes.len() as u64,
            sha256: format!("{:x}", hasher.finalize()),
        })
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0 / 1024.0
    }
}

/// Outcome of one assembly run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Target name (`pdf`, `latex`).
    pub target: String,
    /// Fragments that made it into the document.
    pub fragments: usize,
    pub skipped: Vec<SkippedFragment>,
    pub failures: Vec<ToolFailure>,
    pub outputs: Vec<OutputFile>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// `true` when no external tool failed.
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// The output with the given file name, if it was written.
    pub fn output_named(&self, file_name: &str) -> Option<&OutputFile> {
        self.outputs
            .iter()
            .find(|o| o.path.file_name().is_some_and(|n| n == file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_hashes_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("book.pdf");
        std::fs::write(&path, b"abc").expect("write");

        let out = OutputFile::describe(&path).expect("describe");
        assert_eq!(out.size_bytes, 3);
        assert_eq!(
            out.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn describe_missing_file_is_io_error() {
        let err = OutputFile::describe(Path::new("/no/such/book.pdf")).unwrap_err();
        assert!(matches!(err, BinderyError::Io { .. }));
    }

    #[test]
    fn tool_failure_keeps_tool_name() {
        let err = BinderyError::tool("pandoc", "exit status 64");
        let failure = ToolFailure::from_error("converter", "9-chapter-i.xhtml", &err);
        assert_eq!(failure.tool, "pandoc");
        assert_eq!(failure.message, "exit status 64");

        let err = BinderyError::validation("bad input");
        let failure = ToolFailure::from_error("converter", "x", &err);
        assert_eq!(failure.tool, "converter");
        assert!(failure.message.contains("bad input"));
    }

    #[test]
    fn report_success_tracks_failures() {
        let mut report = RunReport::new("latex");
        assert!(report.succeeded());
        report.failures.push(ToolFailure {
            tool: "rsvg-convert".into(),
            subject: "brushstroke.svg".into(),
            message: "not installed".into(),
        });
        assert!(!report.succeeded());
    }

    #[test]
    fn skip_reasons_display() {
        assert_eq!(SkipReason::Missing.to_string(), "file not found");
        assert_eq!(
            SkipReason::NoContentRegion(ExtractError::MissingClose).to_string(),
            "no content region: no </body> closing tag after the opening tag"
        );
    }
}
