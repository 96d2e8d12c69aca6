//! Output serializers for the tagged fragment sequence.
//!
//! - [`markup`]: one combined HTML document rendered to a print PDF.
//! - [`latex`]: a master typesetting source plus one included file per fragment.

pub mod latex;
pub mod markup;

use std::path::Path;

use tracing::debug;

use bindery_manifest::PackageMetadata;
use bindery_shared::{BinderyError, BookConfig, Result};

use crate::pipeline::FragmentSequence;
use crate::report::RunReport;

/// Bibliographic data for document headers: `[book]` overrides first, then
/// the package metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub title: String,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    /// BCP 47 language tag.
    pub language: String,
}

impl DocumentInfo {
    pub fn resolve(book: &BookConfig, metadata: &PackageMetadata) -> Self {
        let author = book.author.clone().or_else(|| {
            (!metadata.creators.is_empty()).then(|| metadata.creators.join(" & "))
        });

        Self {
            title: book
                .title
                .clone()
                .or_else(|| metadata.title.clone())
                .unwrap_or_else(|| "Untitled".to_string()),
            subtitle: book.subtitle.clone(),
            author,
            date: book.date.clone().or_else(|| metadata.date.clone()),
            language: metadata.language.clone().unwrap_or_else(|| "en".to_string()),
        }
    }
}

/// Turns a [`FragmentSequence`] into one output target.
///
/// Fatal problems (an output directory that cannot be created) are `Err`;
/// external tool failures are recorded in the report and serialization
/// carries on.
pub trait DocumentSerializer {
    /// Short target name used in logs and the run report.
    fn target(&self) -> &'static str;

    fn serialize(&mut self, sequence: &FragmentSequence, report: &mut RunReport) -> Result<()>;
}

/// Write a file via a sibling temp file and rename.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| BinderyError::validation(format!("not a file path: {}", path.display())))?;
    let temp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    std::fs::write(&temp, content).map_err(|e| BinderyError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| BinderyError::io(path, e))?;

    debug!(file = %path.display(), size = content.len(), "wrote file");
    Ok(())
}

/// Create `dir` and its parents. Failure is fatal for the run.
pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| BinderyError::io(dir, e))
}
