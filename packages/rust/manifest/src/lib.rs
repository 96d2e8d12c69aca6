//! Package manifest resolution.
//!
//! Reads an OPF package document (manifest of `id → href` entries plus an
//! ordered spine of `idref`s) and resolves the spine into the linear list of
//! fragment locations that drives assembly.

mod parser;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use bindery_shared::{BinderyError, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One `<item>` of the manifest section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Unique identifier within the manifest.
    pub id: String,
    /// Location relative to the package document's directory.
    pub href: String,
    /// Declared media type (empty when absent).
    pub media_type: String,
}

/// One `<itemref>` of the spine, as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineRef {
    pub idref: String,
    /// `false` for `linear="no"` items. Print output still includes them.
    pub linear: bool,
}

/// A spine position resolved against the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    pub idref: String,
    pub href: String,
    pub linear: bool,
}

impl SpineItem {
    /// File name of the fragment (last path segment of `href`).
    pub fn file_name(&self) -> &str {
        self.href.rsplit('/').next().unwrap_or(&self.href)
    }
}

/// Bibliographic fields from the `<metadata>` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub title: Option<String>,
    pub creators: Vec<String>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub date: Option<String>,
}

impl PackageMetadata {
    /// Store one metadata element's text. First value wins for single fields.
    fn record(&mut self, field: &[u8], value: &str) {
        if value.is_empty() {
            return;
        }
        let slot = match field {
            b"creator" => {
                self.creators.push(value.to_string());
                return;
            }
            b"title" => &mut self.title,
            b"language" => &mut self.language,
            b"publisher" => &mut self.publisher,
            b"date" => &mut self.date,
            _ => return,
        };
        if slot.is_none() {
            *slot = Some(value.to_string());
        }
    }
}

/// A parsed package document.
#[derive(Debug, Clone)]
pub struct Package {
    /// Directory that manifest hrefs are relative to.
    pub base_dir: PathBuf,
    pub metadata: PackageMetadata,
    /// Manifest entries in document order.
    pub manifest: Vec<ManifestEntry>,
    index: HashMap<String, usize>,
    /// Spine references in reading order.
    pub spine: Vec<SpineRef>,
}

impl Package {
    /// Parse a package document held in memory.
    ///
    /// `origin` is where the document lives; its parent becomes `base_dir`.
    pub fn parse(xml: &str, origin: &Path) -> Result<Self> {
        parser::parse_package(xml, origin)
    }

    /// Look up a manifest entry by identifier.
    pub fn entry(&self, id: &str) -> Option<&ManifestEntry> {
        self.index.get(id).map(|&i| &self.manifest[i])
    }

    /// Resolve the spine into ordered locations.
    ///
    /// Unresolved `idref`s are skipped with a warning; partial manifests are
    /// expected while a book is being written.
    pub fn resolve_spine(&self) -> Vec<SpineItem> {
        self.spine
            .iter()
            .filter_map(|spine_ref| match self.entry(&spine_ref.idref) {
                Some(entry) => Some(SpineItem {
                    idref: spine_ref.idref.clone(),
                    href: entry.href.clone(),
                    linear: spine_ref.linear,
                }),
                None => {
                    warn!(idref = %spine_ref.idref, "spine references unknown manifest id, skipping");
                    None
                }
            })
            .collect()
    }

    /// On-disk location of a resolved spine item.
    pub fn location(&self, item: &SpineItem) -> PathBuf {
        self.base_dir.join(&item.href)
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load and parse the package document at `path`.
///
/// A missing or malformed package document is fatal: nothing can be
/// assembled without it.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_package(path: &Path) -> Result<Package> {
    if !path.is_file() {
        return Err(BinderyError::manifest(path, "package document not found"));
    }

    let xml = std::fs::read_to_string(path).map_err(|e| BinderyError::io(path, e))?;
    let package = Package::parse(&xml, path)?;

    info!(
        items = package.manifest.len(),
        spine = package.spine.len(),
        "package document loaded"
    );

    Ok(package)
}
