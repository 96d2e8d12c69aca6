//! Combined-markup target: one HTML document rendered to a print PDF.
//!
//! The document inlines three stylesheet layers (fonts, base, print, in that
//! order so print overrides win) and wraps each fragment in its own
//! `section.chapter-section`. A separate page stylesheet fixes the trim size,
//! margins and page breaks for the renderer.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use bindery_markup::{ResourceRewriter, prepare_print_stylesheet};
use bindery_shared::{BinderyError, PageGeometry, PdfConfig, Result};

use super::{DocumentInfo, DocumentSerializer, ensure_dir};
use crate::pipeline::{FragmentSequence, TaggedFragment};
use crate::report::{OutputFile, RunReport, ToolFailure};
use crate::tools::PrintRenderer;

const FONTS_CSS: &str = "fonts.css";
const BASE_CSS: &str = "style.css";
const PRINT_CSS: &str = "print.css";

// ---------------------------------------------------------------------------
// Stylesheet layers
// ---------------------------------------------------------------------------

/// The inlined stylesheet layers, already rewritten for the combined document.
#[derive(Debug, Clone, Default)]
pub struct StyleLayers {
    pub fonts: Option<String>,
    pub base: Option<String>,
    pub print: Option<String>,
}

impl StyleLayers {
    /// Read the three layers from `style_dir`. Missing files are skipped.
    pub fn load(style_dir: &Path, rewriter: &ResourceRewriter) -> Self {
        let read = |name: &str| {
            let path = style_dir.join(name);
            match std::fs::read_to_string(&path) {
                Ok(css) => Some(rewriter.rewrite(&css)),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "stylesheet layer skipped");
                    None
                }
            }
        };

        Self {
            fonts: read(FONTS_CSS),
            base: read(BASE_CSS),
            print: read(PRINT_CSS)
                .map(|css| prepare_print_stylesheet(&css, &[FONTS_CSS, BASE_CSS])),
        }
    }

    fn in_order(&self) -> impl Iterator<Item = &str> {
        [&self.fonts, &self.base, &self.print]
            .into_iter()
            .filter_map(|layer| layer.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Build the combined document.
///
/// Every fragment becomes exactly one section, in sequence order. Only the
/// first section avoids a page break before it.
pub fn combine_markup(
    info: &DocumentInfo,
    styles: &StyleLayers,
    fragments: &[TaggedFragment],
    rewriter: &ResourceRewriter,
) -> String {
    let mut out = String::new();

    out.push_str("<!DOCTYPE html>\n");
    let _ = writeln!(
        out,
        r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{}">"#,
        escape_html(&info.language)
    );
    out.push_str("<head>\n<meta charset=\"UTF-8\"/>\n");
    let title = match &info.subtitle {
        Some(sub) => format!("{}: {sub}", info.title),
        None => info.title.clone(),
    };
    let _ = writeln!(out, "<title>{}</title>", escape_html(&title));
    for css in styles.in_order() {
        let _ = writeln!(out, "<style>{css}</style>");
    }
    out.push_str("</head>\n<body>\n");

    for (i, fragment) in fragments.iter().enumerate() {
        let brk = if i == 0 { "avoid" } else { "page" };
        let _ = writeln!(
            out,
            r#"<section class="chapter-section" data-file="{}" data-role="{}" data-zone="{}" data-break="{brk}">"#,
            escape_html(&fragment.href),
            fragment.role,
            fragment.zone,
        );
        out.push_str(&rewriter.rewrite(&fragment.content));
        out.push_str("\n</section>\n");
    }

    out.push_str("</body>\n</html>\n");
    out
}

/// Renderer override layer: trim size, margins, breaks and compatibility fixes.
///
/// Print-on-demand services add their own marks and bleed, so the trim size
/// is exact and marks are off on every page.
pub fn page_stylesheet(page: &PageGeometry) -> String {
    format!(
        r#"@page {{
    size: {width}pt {height}pt !important;
    margin-top: {top}pt;
    margin-bottom: {bottom}pt;
    margin-left: {left}pt;
    margin-right: {outside}pt;
    marks: none !important;
}}

@page :left {{
    margin-left: {inside}pt;
    margin-right: {outside}pt;
}}

@page :right {{
    margin-left: {outside}pt;
    margin-right: {inside}pt;
}}

@page :first {{
    margin-top: {first}pt;
    marks: none !important;
}}

@page :blank {{
    marks: none !important;
}}

section.chapter-section[data-break="page"] {{
    page-break-before: always;
    break-before: page;
}}

section.chapter-section[data-break="avoid"] {{
    page-break-before: avoid;
    break-before: avoid;
}}

/* Floated drop caps trip the renderer's layout; keep them inline. */
.introduction-paragraph p:first-of-type strong:first-child,
.dropcap-first-letter p:first-of-type strong:first-child,
p.intro-text:first-of-type::first-letter {{
    float: none !important;
    display: inline;
    font-size: 24pt;
    font-weight: bold;
}}

img {{
    max-width: 100%;
    height: auto;
}}

/* Flex layout is unsupported in paged media here. */
.title-page-body,
.copyright-body,
.dedication-page,
.chap-title,
.part-body,
.part-page,
.quote-page,
.image-quote {{
    display: block;
}}
"#,
        width = page.width_pt,
        height = page.height_pt,
        top = page.margin_top_pt,
        bottom = page.margin_bottom_pt,
        left = page.margin_left_pt,
        inside = page.margin_inside_pt,
        outside = page.margin_outside_pt,
        first = page.first_page_top_pt,
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Serializer
// ---------------------------------------------------------------------------

/// Print-on-demand PDF serializer.
pub struct MarkupAssembler<'a> {
    /// Package directory; fragment and stylesheet references resolve from here.
    pub base_dir: &'a Path,
    /// Stylesheet directory, relative to `base_dir`.
    pub style_dir: &'a Path,
    pub pdf: &'a PdfConfig,
    pub info: DocumentInfo,
    pub renderer: &'a dyn PrintRenderer,
}

impl DocumentSerializer for MarkupAssembler<'_> {
    fn target(&self) -> &'static str {
        "pdf"
    }

    #[instrument(skip_all, fields(output = %self.pdf.output.display()))]
    fn serialize(&mut self, sequence: &FragmentSequence, report: &mut RunReport) -> Result<()> {
        let output = &self.pdf.output;
        let out_dir = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        ensure_dir(&out_dir)?;

        let base = std::path::absolute(self.base_dir).map_err(|e| BinderyError::io(self.base_dir, e))?;
        let rewriter = ResourceRewriter::absolute(&base)?;
        let styles = StyleLayers::load(&base.join(self.style_dir), &rewriter);

        let combined = combine_markup(&self.info, &styles, &sequence.fragments, &rewriter);
        let page_css = page_stylesheet(&self.pdf.page);

        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "book".to_string());

        // Scoped intermediates: removed on drop, whatever the renderer does.
        let html_file = scratch_file(&out_dir, &format!("{stem}-combined-"), ".html", &combined)?;
        let css_file = scratch_file(&out_dir, &format!("{stem}-page-"), ".css", &page_css)?;

        info!(
            sections = sequence.fragments.len(),
            bytes = combined.len(),
            renderer = self.renderer.name(),
            "rendering combined document"
        );

        match self.renderer.render(html_file.path(), css_file.path(), output) {
            Ok(()) => match OutputFile::describe(output) {
                Ok(described) => report.outputs.push(described),
                Err(e) => {
                    warn!(error = %e, "renderer reported success but wrote no output");
                    report.failures.push(ToolFailure::from_error(
                        self.renderer.name(),
                        output.display().to_string(),
                        &e,
                    ));
                }
            },
            Err(e) => {
                warn!(error = %e, "print renderer failed");
                report.failures.push(ToolFailure::from_error(
                    self.renderer.name(),
                    output.display().to_string(),
                    &e,
                ));
            }
        }

        if self.pdf.keep_intermediate {
            for file in [html_file, css_file] {
                let (_, path) = file.keep().map_err(|e| BinderyError::io(&out_dir, e.error))?;
                info!(path = %path.display(), "kept intermediate file");
            }
        }

        Ok(())
    }
}

fn scratch_file(dir: &Path, prefix: &str, suffix: &str, content: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile_in(dir)
        .map_err(|e| BinderyError::io(dir, e))?;
    let written = file.write_all(content.as_bytes()).and_then(|()| file.flush());
    written.map_err(|e| BinderyError::io(file.path(), e))?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use scraper::{Html, Selector};

    use super::*;
    use crate::pipeline::{SilentProgress, assemble};
    use bindery_shared::{MatterZone, StructuralRole};

    const FIXTURE: &str = "../../../fixtures/epub/OEBPS/content.opf";

    fn fragment(href: &str, role: StructuralRole, content: &str) -> TaggedFragment {
        TaggedFragment {
            href: href.to_string(),
            content: content.to_string(),
            role,
            zone: MatterZone::Front,
            transition: None,
            heading: None,
        }
    }

    fn info() -> DocumentInfo {
        DocumentInfo {
            title: "Curls & Contemplation".into(),
            subtitle: None,
            author: None,
            date: None,
            language: "en".into(),
        }
    }

    fn rewriter() -> ResourceRewriter {
        ResourceRewriter::absolute(Path::new("/book/OEBPS")).expect("rewriter")
    }

    /// Captures what it was asked to render and writes a placeholder PDF.
    #[derive(Default)]
    struct StubRenderer {
        fail: bool,
        seen: RefCell<Option<(String, String)>>,
    }

    impl PrintRenderer for StubRenderer {
        fn name(&self) -> &str {
            "stub-weasyprint"
        }

        fn render(&self, markup: &Path, stylesheet: &Path, output: &Path) -> Result<()> {
            let html = std::fs::read_to_string(markup).map_err(|e| BinderyError::io(markup, e))?;
            let css = std::fs::read_to_string(stylesheet).map_err(|e| BinderyError::io(stylesheet, e))?;
            *self.seen.borrow_mut() = Some((html, css));
            if self.fail {
                return Err(BinderyError::tool("stub-weasyprint", "layout assertion"));
            }
            std::fs::write(output, b"%PDF-1.7 stub").map_err(|e| BinderyError::io(output, e))
        }
    }

    #[test]
    fn one_section_per_fragment_in_order() {
        let fragments = [
            fragment("xhtml/1-TitlePage.xhtml", StructuralRole::Title, "<h1>Title</h1>"),
            fragment("xhtml/2-Copyright.xhtml", StructuralRole::Copyright, "<p>(c)</p>"),
            fragment("xhtml/9-chapter-i.xhtml", StructuralRole::Chapter, r#"<img src="../images/a.png"/>"#),
        ];
        let html = combine_markup(&info(), &StyleLayers::default(), &fragments, &rewriter());

        let doc = Html::parse_document(&html);
        let sel = Selector::parse("section.chapter-section").expect("selector");
        let sections: Vec<_> = doc.select(&sel).collect();
        assert_eq!(sections.len(), 3);

        let files: Vec<_> = sections.iter().filter_map(|s| s.value().attr("data-file")).collect();
        assert_eq!(
            files,
            ["xhtml/1-TitlePage.xhtml", "xhtml/2-Copyright.xhtml", "xhtml/9-chapter-i.xhtml"]
        );

        let breaks: Vec<_> = sections.iter().filter_map(|s| s.value().attr("data-break")).collect();
        assert_eq!(breaks, ["avoid", "page", "page"]);

        assert_eq!(sections[2].value().attr("data-role"), Some("chapter"));
        assert!(html.contains(r#"src="/book/OEBPS/images/a.png""#));
        assert!(html.contains("<title>Curls &amp; Contemplation</title>"));
    }

    #[test]
    fn style_layers_in_fixed_order() {
        let styles = StyleLayers {
            fonts: Some("/*fonts*/".into()),
            base: Some("/*base*/".into()),
            print: Some("/*print*/".into()),
        };
        let html = combine_markup(&info(), &styles, &[], &rewriter());
        let fonts = html.find("/*fonts*/").expect("fonts");
        let base = html.find("/*base*/").expect("base");
        let print = html.find("/*print*/").expect("print");
        assert!(fonts < base && base < print);
    }

    #[test]
    fn page_stylesheet_uses_geometry() {
        let css = page_stylesheet(&PageGeometry::default());
        assert!(css.contains("size: 432pt 648pt"));
        assert!(css.contains("margin-left: 63pt;"));
        assert!(css.contains("margin-top: 72pt;"));
        assert!(css.contains("marks: none"));
        assert!(css.contains(r#"[data-break="page"]"#));
    }

    #[test]
    fn fixture_renders_and_cleans_up_intermediates() {
        let package = bindery_manifest::load_package(Path::new(FIXTURE)).expect("fixture");
        let out = tempfile::tempdir().expect("tempdir");
        let pdf = PdfConfig {
            output: out.path().join("book.pdf"),
            ..PdfConfig::default()
        };
        let renderer = StubRenderer::default();
        let mut assembler = MarkupAssembler {
            base_dir: &package.base_dir,
            style_dir: Path::new("style"),
            pdf: &pdf,
            info: DocumentInfo::resolve(&Default::default(), &package.metadata),
            renderer: &renderer,
        };

        let report = assemble(&package, &mut assembler, &SilentProgress).expect("assemble");
        assert!(report.succeeded());
        assert_eq!(report.outputs.len(), 1);
        assert_eq!(report.outputs[0].size_bytes, 13);

        let (html, css) = renderer.seen.borrow().clone().expect("rendered");
        assert_eq!(html.matches("<section class=\"chapter-section\"").count(), report.fragments);
        assert!(html.contains("/* style.css already inlined */"));
        assert!(!html.contains("marks: crop"));
        assert!(!html.contains("url('../fonts/"));
        assert!(css.contains("size: 432pt 648pt"));

        let leftovers: Vec<_> = std::fs::read_dir(out.path())
            .expect("read_dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(leftovers, ["book.pdf"]);
    }

    #[test]
    fn renderer_failure_is_recorded_and_intermediates_removed() {
        let package = bindery_manifest::load_package(Path::new(FIXTURE)).expect("fixture");
        let out = tempfile::tempdir().expect("tempdir");
        let pdf = PdfConfig {
            output: out.path().join("book.pdf"),
            ..PdfConfig::default()
        };
        let renderer = StubRenderer {
            fail: true,
            ..StubRenderer::default()
        };
        let mut assembler = MarkupAssembler {
            base_dir: &package.base_dir,
            style_dir: Path::new("style"),
            pdf: &pdf,
            info: DocumentInfo::resolve(&Default::default(), &package.metadata),
            renderer: &renderer,
        };

        let report = assemble(&package, &mut assembler, &SilentProgress).expect("assemble");
        assert!(!report.succeeded());
        assert_eq!(report.failures[0].tool, "stub-weasyprint");
        assert!(report.outputs.is_empty());
        assert_eq!(std::fs::read_dir(out.path()).expect("read_dir").count(), 0);
    }

    #[test]
    fn keep_intermediate_leaves_files() {
        let package = bindery_manifest::load_package(Path::new(FIXTURE)).expect("fixture");
        let out = tempfile::tempdir().expect("tempdir");
        let pdf = PdfConfig {
            output: out.path().join("book.pdf"),
            keep_intermediate: true,
            ..PdfConfig::default()
        };
        let renderer = StubRenderer::default();
        let mut assembler = MarkupAssembler {
            base_dir: &package.base_dir,
            style_dir: Path::new("style"),
            pdf: &pdf,
            info: DocumentInfo::resolve(&Default::default(), &package.metadata),
            renderer: &renderer,
        };

        assemble(&package, &mut assembler, &SilentProgress).expect("assemble");
        let names: Vec<_> = std::fs::read_dir(out.path())
            .expect("read_dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 3);
        assert!(names.iter().any(|n| n.starts_with("book-combined-") && n.ends_with(".html")));
        assert!(names.iter().any(|n| n.starts_with("book-page-") && n.ends_with(".css")));
    }
}
