//! Application configuration for Bindery.
//!
//! The project config lives at `./bindery.toml`, with a per-user fallback at
//! `~/.bindery/bindery.toml`. Missing files mean built-in defaults, which
//! reproduce the fixed relative layout of an EPUB source tree under `pub/`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BinderyError, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "bindery.toml";

/// Per-user config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".bindery";

// ---------------------------------------------------------------------------
// Config structs (matching bindery.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Source tree layout.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Print-on-demand PDF target.
    #[serde(default)]
    pub pdf: PdfConfig,

    /// Typesetting source target.
    #[serde(default)]
    pub latex: LatexConfig,

    /// Bibliographic overrides for the package metadata.
    #[serde(default)]
    pub book: BookConfig,

    /// External tool commands.
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// `[paths]` section. Every path except `oebps_dir` is relative to `oebps_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_oebps_dir")]
    pub oebps_dir: PathBuf,
    #[serde(default = "default_package_file")]
    pub package_file: PathBuf,
    #[serde(default = "default_style_dir")]
    pub style_dir: PathBuf,
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,
    #[serde(default = "default_fonts_dir")]
    pub fonts_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            oebps_dir: default_oebps_dir(),
            package_file: default_package_file(),
            style_dir: default_style_dir(),
            images_dir: default_images_dir(),
            fonts_dir: default_fonts_dir(),
        }
    }
}

impl PathsConfig {
    /// Absolute-or-relative path of the OPF package document.
    pub fn package_path(&self) -> PathBuf {
        self.oebps_dir.join(&self.package_file)
    }
}

fn default_oebps_dir() -> PathBuf {
    PathBuf::from("pub/OEBPS")
}
fn default_package_file() -> PathBuf {
    PathBuf::from("content.opf")
}
fn default_style_dir() -> PathBuf {
    PathBuf::from("style")
}
fn default_images_dir() -> PathBuf {
    PathBuf::from("images")
}
fn default_fonts_dir() -> PathBuf {
    PathBuf::from("fonts")
}

/// `[pdf]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfConfig {
    /// Output PDF path.
    #[serde(default = "default_pdf_output")]
    pub output: PathBuf,

    /// Keep the combined HTML and page stylesheet next to the output.
    #[serde(default)]
    pub keep_intermediate: bool,

    /// Trim size and margins.
    #[serde(default)]
    pub page: PageGeometry,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            output: default_pdf_output(),
            keep_intermediate: false,
            page: PageGeometry::default(),
        }
    }
}

fn default_pdf_output() -> PathBuf {
    PathBuf::from("CurlsAndContemplation-POD-6x9.pdf")
}

/// `[pdf.page]` section. All values are in PostScript points (72 per inch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width_pt: f32,
    pub height_pt: f32,
    pub margin_top_pt: f32,
    pub margin_bottom_pt: f32,
    pub margin_inside_pt: f32,
    pub margin_outside_pt: f32,
    /// Left margin on pages that have no recto/verso rule applied.
    pub margin_left_pt: f32,
    pub first_page_top_pt: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        // 6" x 9" trim, 0.75" top/bottom, 0.875" gutter, 0.625" outside.
        Self {
            width_pt: 432.0,
            height_pt: 648.0,
            margin_top_pt: 54.0,
            margin_bottom_pt: 54.0,
            margin_inside_pt: 63.0,
            margin_outside_pt: 45.0,
            margin_left_pt: 54.0,
            first_page_top_pt: 72.0,
        }
    }
}

impl PageGeometry {
    /// Trim size in inches, for summaries.
    pub fn trim_inches(&self) -> (f32, f32) {
        (self.width_pt / 72.0, self.height_pt / 72.0)
    }
}

/// `[latex]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatexConfig {
    /// Directory holding the master document.
    #[serde(default = "default_latex_output_dir")]
    pub output_dir: PathBuf,

    /// Subdirectory of `output_dir` for per-fragment sources and assets.
    #[serde(default = "default_fragments_subdir")]
    pub fragments_subdir: String,

    /// Master document file name.
    #[serde(default = "default_master_file")]
    pub master_file: String,
}

impl Default for LatexConfig {
    fn default() -> Self {
        Self {
            output_dir: default_latex_output_dir(),
            fragments_subdir: default_fragments_subdir(),
            master_file: default_master_file(),
        }
    }
}

fn default_latex_output_dir() -> PathBuf {
    PathBuf::from("pdf")
}
fn default_fragments_subdir() -> String {
    "latex".into()
}
fn default_master_file() -> String {
    "CurlsAndContemplation-master.tex".into()
}

/// `[book]` section. Unset fields fall back to the package metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// `[tools]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Markup-to-typesetting converter.
    #[serde(default = "default_converter")]
    pub converter: String,

    /// Browser-based print renderer.
    #[serde(default = "default_renderer")]
    pub renderer: String,

    /// SVG-to-PDF converter for typeset images.
    #[serde(default = "default_vector_converter")]
    pub vector_converter: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            converter: default_converter(),
            renderer: default_renderer(),
            vector_converter: default_vector_converter(),
        }
    }
}

fn default_converter() -> String {
    "pandoc".into()
}
fn default_renderer() -> String {
    "weasyprint".into()
}
fn default_vector_converter() -> String {
    "rsvg-convert".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Path of the per-user config file (`~/.bindery/bindery.toml`).
pub fn user_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BinderyError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load the application config.
///
/// Lookup order: `explicit` → `./bindery.toml` → `~/.bindery/bindery.toml`
/// → defaults. An explicit path that does not exist is an error.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(BinderyError::config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        return load_config_from(path);
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return load_config_from(&local);
    }

    if let Ok(user) = user_config_path() {
        if user.exists() {
            return load_config_from(&user);
        }
    }

    tracing::debug!("no config file found, using defaults");
    Ok(AppConfig::default())
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BinderyError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| BinderyError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file at `path`. Refuses to overwrite.
pub fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(BinderyError::config(format!(
            "{} already exists; not overwriting",
            path.display()
        )));
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| BinderyError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| BinderyError::io(path, e))?;
    tracing::info!(path = %path.display(), "created default config file");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("oebps_dir"));
        assert!(toml_str.contains("weasyprint"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.paths.package_path(), PathBuf::from("pub/OEBPS/content.opf"));
        assert_eq!(parsed.pdf.page, PageGeometry::default());
        assert_eq!(parsed.latex.fragments_subdir, "latex");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[paths]
oebps_dir = "book/OEBPS"

[book]
title = "A Shorter Title"

[pdf.page]
width_pt = 396.0
height_pt = 612.0
margin_top_pt = 54.0
margin_bottom_pt = 54.0
margin_inside_pt = 63.0
margin_outside_pt = 45.0
margin_left_pt = 54.0
first_page_top_pt = 72.0
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.paths.package_path(), PathBuf::from("book/OEBPS/content.opf"));
        assert_eq!(config.book.title.as_deref(), Some("A Shorter Title"));
        assert_eq!(config.book.author, None);
        assert_eq!(config.pdf.page.trim_inches(), (5.5, 8.5));
        assert_eq!(config.tools.converter, "pandoc");
    }

    #[test]
    fn unknown_section_is_rejected() {
        let err = toml::from_str::<AppConfig>("[epub]\nversion = 3\n").unwrap_err();
        assert!(err.to_string().contains("epub"));
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let err = load_config(Some(Path::new("/definitely/not/here/bindery.toml"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn init_config_refuses_to_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);

        init_config(&path).expect("first init");
        let loaded = load_config_from(&path).expect("load");
        assert_eq!(loaded.tools.renderer, "weasyprint");

        let err = init_config(&path).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
