//! Structural-source target: a XeLaTeX master document plus one included
//! source file per fragment.
//!
//! Layout under `[latex] output_dir`:
//! ```text
//! <output_dir>/
//! ├── <master_file>            \input{<subdir>/<name>} per fragment
//! └── <subdir>/
//!     ├── <name>.tex           converted fragment body
//!     ├── images/              copied images (+ PDFs converted from SVG)
//!     └── fonts/
//! ```

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use bindery_markup::ResourceRewriter;
use bindery_shared::{LatexConfig, PageGeometry, PathsConfig, Result, StructuralRole};

use super::{DocumentInfo, DocumentSerializer, ensure_dir, write_atomic};
use crate::assets::{convert_vector_images, copy_assets};
use crate::classify::{file_stem, title_from_name};
use crate::pipeline::{FragmentSequence, TaggedFragment};
use crate::report::{OutputFile, RunReport, ToolFailure};
use crate::tools::{MarkupConverter, VectorConverter};
use crate::zone::ZoneTransition;

// ---------------------------------------------------------------------------
// Text helpers
// ---------------------------------------------------------------------------

/// Escape text for use inside LaTeX arguments.
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            c => out.push(c),
        }
    }
    out
}

/// Polyglossia language name for a BCP 47 tag.
fn polyglossia_language(tag: &str) -> &'static str {
    let primary = tag.split(['-', '_']).next().unwrap_or(tag).to_ascii_lowercase();
    match primary.as_str() {
        "fr" => "french",
        "de" => "german",
        "es" => "spanish",
        "it" => "italian",
        "pt" => "portuguese",
        "nl" => "dutch",
        _ => "english",
    }
}

// ---------------------------------------------------------------------------
// Master document
// ---------------------------------------------------------------------------

const PACKAGES: &str = r"% ----------------------------------------------------------------------------
% Packages
% ----------------------------------------------------------------------------
\usepackage{fontspec}
\usepackage{polyglossia}
\usepackage{graphicx}
\usepackage{xcolor}
\usepackage{titlesec}
\usepackage{titletoc}
\usepackage{fancyhdr}
\usepackage{enumitem}
\usepackage{longtable}
\usepackage{booktabs}
\usepackage{array}
\usepackage{multirow}
\usepackage{float}
\usepackage{wrapfig}
\usepackage{soul}
\usepackage{setspace}
\usepackage{microtype}
\usepackage{lettrine}
\usepackage{epigraph}
\usepackage{tikz}
\usepackage{calc}
\usepackage{etoolbox}
\usepackage[most]{tcolorbox}
\usepackage{hyperref}
\usepackage{bookmark}

% Converter output relies on these.
\providecommand{\tightlist}{\setlength{\itemsep}{0pt}\setlength{\parskip}{0pt}}
\setcounter{secnumdepth}{-\maxdimen}

% ----------------------------------------------------------------------------
% Colours
% ----------------------------------------------------------------------------
\definecolor{teal}{RGB}{43,153,153}
\definecolor{tealdark}{RGB}{31,114,114}
\definecolor{gold}{RGB}{201,169,97}
\definecolor{golddark}{RGB}{176,143,74}
\definecolor{ink}{RGB}{26,26,26}

% ----------------------------------------------------------------------------
% Fonts
% ----------------------------------------------------------------------------
\setmainfont{DejaVu Serif}[Ligatures=TeX]
\setsansfont{DejaVu Sans}[Scale=0.95, Ligatures=TeX]
\setmonofont{DejaVu Sans Mono}[Scale=0.85]

% ----------------------------------------------------------------------------
% Sectioning
% ----------------------------------------------------------------------------
\titleformat{\part}[display]
    {\centering\Huge\bfseries\color{tealdark}}
    {\partname\ \thepart}
    {20pt}
    {\Huge}

\titleformat{\chapter}[display]
    {\normalfont\huge\bfseries\centering\color{tealdark}}
    {}
    {0pt}
    {\huge}

\titleformat{\section}
    {\normalfont\Large\bfseries\color{tealdark}}
    {\thesection}
    {1em}
    {}
    [\color{gold}\titlerule]

\titleformat{\subsection}
    {\normalfont\large\bfseries\color{teal}}
    {\thesubsection}
    {1em}
    {}

\titlespacing*{\chapter}{0pt}{30pt}{20pt}
\titlespacing*{\section}{0pt}{20pt}{10pt}

% ----------------------------------------------------------------------------
% Boxes and journal pages
% ----------------------------------------------------------------------------
\newenvironment{actionsteps}{%
    \begin{tcolorbox}[colback=teal!5, colframe=teal, boxrule=0.5pt, arc=0pt, leftrule=4pt]
    \textbf{\color{tealdark}ACTION STEPS}\\[0.5em]
}{%
    \end{tcolorbox}
}

\newenvironment{casestudy}{%
    \begin{tcolorbox}[colback=gold!5, colframe=gold, boxrule=1pt, arc=0pt]
    \textbf{\color{golddark}CASE STUDY}\\[0.5em]
}{%
    \end{tcolorbox}
}

\newenvironment{reflection}{\begin{quote}\itshape}{\end{quote}}

\newcommand{\writinglines}[1]{%
    \foreach \n in {1,...,#1}{%
        \noindent\rule{\linewidth}{0.4pt}\\[0.5em]%
    }%
}

% ----------------------------------------------------------------------------
% Table of contents
% ----------------------------------------------------------------------------
\titlecontents{part}[0em]
    {\addvspace{2em}\bfseries\large}
    {\partname\ \thecontentslabel\quad}
    {}
    {\hfill\contentspage}

\titlecontents{chapter}[1.5em]
    {\addvspace{1em}\bfseries}
    {\contentslabel{1.5em}}
    {\hspace*{-1.5em}}
    {\titlerule*[0.5pc]{.}\contentspage}

% ----------------------------------------------------------------------------
% Paragraphs
% ----------------------------------------------------------------------------
\widowpenalty=10000
\clubpenalty=10000
\setstretch{1.15}
\setlength{\parindent}{0.25in}
\setlength{\parskip}{0pt}
\setlist[itemize]{leftmargin=*,itemsep=0.5em}
\setlist[enumerate]{leftmargin=*,itemsep=0.5em}
";

/// Everything before `\begin{document}`.
pub fn preamble(info: &DocumentInfo, page: &PageGeometry, fragments_subdir: &str) -> String {
    let title = escape_latex(&info.title);
    let mut out = String::new();

    out.push_str("\\documentclass[11pt,twoside]{book}\n\n");

    // PostScript points (bp) match the print target's geometry exactly.
    let _ = write!(
        out,
        "% ----------------------------------------------------------------------------
% Page geometry
% ----------------------------------------------------------------------------
\\usepackage[
    paperwidth={}bp,
    paperheight={}bp,
    inner={}bp,
    outer={}bp,
    top={}bp,
    bottom={}bp,
    footskip=0.4in
]{{geometry}}

",
        page.width_pt,
        page.height_pt,
        page.margin_inside_pt,
        page.margin_outside_pt,
        page.margin_top_pt,
        page.margin_bottom_pt,
    );

    out.push_str(PACKAGES);
    let _ = writeln!(
        out,
        "\\setdefaultlanguage{{{}}}",
        polyglossia_language(&info.language)
    );

    let _ = write!(
        out,
        "
% ----------------------------------------------------------------------------
% Headers and footers
% ----------------------------------------------------------------------------
\\pagestyle{{fancy}}
\\fancyhf{{}}
\\fancyhead[LE]{{\\thepage}}
\\fancyhead[RE]{{\\textit{{{title}}}}}
\\fancyhead[LO]{{\\textit{{\\leftmark}}}}
\\fancyhead[RO]{{\\thepage}}
\\renewcommand{{\\headrulewidth}}{{0.4pt}}
\\renewcommand{{\\footrulewidth}}{{0pt}}
\\fancypagestyle{{plain}}{{%
    \\fancyhf{{}}
    \\fancyfoot[C]{{\\thepage}}
    \\renewcommand{{\\headrulewidth}}{{0pt}}
}}

% ----------------------------------------------------------------------------
% Images
% ----------------------------------------------------------------------------
\\graphicspath{{{{{fragments_subdir}/images/}}}}
\\DeclareGraphicsExtensions{{.pdf,.png,.jpg,.jpeg}}

"
    );

    let pdf_title = match &info.subtitle {
        Some(sub) => format!("{title}: {}", escape_latex(sub)),
        None => title.clone(),
    };
    let author = info.author.as_deref().map(escape_latex).unwrap_or_default();

    let _ = write!(
        out,
        "% ----------------------------------------------------------------------------
% Document info
% ----------------------------------------------------------------------------
\\hypersetup{{
    colorlinks=true,
    linkcolor=tealdark,
    urlcolor=teal,
    citecolor=golddark,
    pdftitle={{{pdf_title}}},
    pdfauthor={{{author}}},
    pdflang={{{lang}}}
}}

",
        lang = escape_latex(&info.language),
    );

    match &info.subtitle {
        Some(sub) => {
            let _ = writeln!(
                out,
                "\\title{{{title}\\\\[0.5em]\\large {}}}",
                escape_latex(sub)
            );
        }
        None => {
            let _ = writeln!(out, "\\title{{{title}}}");
        }
    }
    let _ = writeln!(out, "\\author{{{author}}}");
    if let Some(date) = &info.date {
        let _ = writeln!(out, "\\date{{{}}}", escape_latex(date));
    }

    out
}

/// Included-source names (without `.tex`), one per fragment, all distinct.
///
/// A fragment keeps its file stem unless an earlier fragment already took
/// it; then the whole href (extension dropped, `/` flattened to `-`) is
/// used, with a numeric suffix if that is taken too.
pub fn source_names(fragments: &[TaggedFragment]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    fragments
        .iter()
        .map(|fragment| {
            let stem = file_stem(&fragment.href);
            let name = if taken.contains(stem) {
                let flat = href_without_extension(&fragment.href).replace('/', "-");
                let mut name = flat.clone();
                let mut n = 2;
                while taken.contains(name.as_str()) {
                    name = format!("{flat}-{n}");
                    n += 1;
                }
                warn!(href = %fragment.href, source = %name, "file stem already used, renaming source");
                name
            } else {
                stem.to_string()
            };
            taken.insert(name.clone());
            name
        })
        .collect()
}

fn href_without_extension(href: &str) -> &str {
    let name_start = href.rfind('/').map_or(0, |slash| slash + 1);
    match href[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &href[..name_start + dot],
        _ => href,
    }
}

/// The master-document entry for one fragment, without transitions or breaks.
///
/// `source` is the fragment's name from [`source_names`].
pub fn entry_for(fragment: &TaggedFragment, fragments_subdir: &str, source: &str) -> String {
    let input = format!("\\input{{{fragments_subdir}/{source}}}\n");
    let heading = || {
        let text = fragment
            .heading
            .clone()
            .unwrap_or_else(|| title_from_name(&fragment.href));
        escape_latex(&text)
    };

    match fragment.role {
        StructuralRole::Title | StructuralRole::Copyright => {
            format!("\\thispagestyle{{empty}}\n{input}")
        }
        StructuralRole::Toc => "\\tableofcontents\n".to_string(),
        StructuralRole::Part => format!("\\part{{{}}}\n{input}", heading()),
        StructuralRole::Chapter => format!(
            "\\phantomsection\n\\addcontentsline{{toc}}{{chapter}}{{{}}}\n{input}",
            heading()
        ),
        role => match role.heading() {
            Some(name) => format!(
                "\\chapter*{{{name}}}\n\\addcontentsline{{toc}}{{chapter}}{{{name}}}\n{input}"
            ),
            None => input,
        },
    }
}

/// The document body: zone transitions, entries and forced breaks, in order.
pub fn document_body(fragments: &[TaggedFragment], fragments_subdir: &str) -> String {
    let mut out = String::new();

    let names = source_names(fragments);
    for (fragment, source) in fragments.iter().zip(&names) {
        match fragment.transition {
            Some(ZoneTransition::EnterMain) => out.push_str("\n\\mainmatter\n\\pagestyle{fancy}\n\n"),
            Some(ZoneTransition::EnterBack) => out.push_str("\n\\backmatter\n\n"),
            None => {}
        }

        out.push_str(&entry_for(fragment, fragments_subdir, source));
        if fragment.role.always_breaks() {
            out.push_str("\\clearpage\n");
        }
        out.push('\n');
    }

    out
}

/// The complete master document.
pub fn master_document(
    info: &DocumentInfo,
    page: &PageGeometry,
    fragments_subdir: &str,
    fragments: &[TaggedFragment],
) -> String {
    let mut out = preamble(info, page, fragments_subdir);
    out.push_str("\n\\begin{document}\n\n\\frontmatter\n\\pagestyle{plain}\n\n");
    out.push_str(&document_body(fragments, fragments_subdir));
    out.push_str("\\end{document}\n");
    out
}

/// One included source file: a short provenance header plus the converted body.
pub fn fragment_source(fragment: &TaggedFragment, body: &str) -> String {
    format!(
        "% {}\n% Type: {}\n\n{body}",
        fragment.file_name(),
        fragment.role
    )
}

// ---------------------------------------------------------------------------
// Serializer
// ---------------------------------------------------------------------------

/// XeLaTeX source serializer.
pub struct LatexAssembler<'a> {
    /// Package directory; asset directories resolve from here.
    pub base_dir: &'a Path,
    pub paths: &'a PathsConfig,
    pub latex: &'a LatexConfig,
    pub page: &'a PageGeometry,
    pub info: DocumentInfo,
    pub converter: &'a dyn MarkupConverter,
    pub vector: &'a dyn VectorConverter,
}

impl LatexAssembler<'_> {
    /// Copy images and fonts next to the fragment sources and convert SVGs.
    fn stage_assets(&self, fragments_dir: &Path, report: &mut RunReport) -> Result<()> {
        let images = fragments_dir.join("images");
        copy_assets(&self.base_dir.join(&self.paths.images_dir), &images)?;
        copy_assets(
            &self.base_dir.join(&self.paths.fonts_dir),
            &fragments_dir.join("fonts"),
        )?;
        report
            .failures
            .extend(convert_vector_images(&images, self.vector)?);
        Ok(())
    }
}

impl DocumentSerializer for LatexAssembler<'_> {
    fn target(&self) -> &'static str {
        "latex"
    }

    #[instrument(skip_all, fields(output_dir = %self.latex.output_dir.display()))]
    fn serialize(&mut self, sequence: &FragmentSequence, report: &mut RunReport) -> Result<()> {
        let subdir = self.latex.fragments_subdir.trim_matches('/');
        let fragments_dir = self.latex.output_dir.join(subdir);
        ensure_dir(&fragments_dir)?;

        self.stage_assets(&fragments_dir, report)?;

        let images_name = self
            .paths
            .images_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "images".to_string());
        let rewriter = ResourceRewriter::engine_relative(&images_name, &format!("{subdir}/images/"))?;

        let names = source_names(&sequence.fragments);
        let mut written = 0;
        for (fragment, source) in sequence.fragments.iter().zip(&names) {
            // The table of contents is generated by the engine.
            if fragment.role == StructuralRole::Toc {
                continue;
            }

            let converted = match self.converter.convert(&fragment.content) {
                Ok(source) => source,
                Err(e) => {
                    warn!(href = %fragment.href, error = %e, "conversion failed, writing empty body");
                    report.failures.push(ToolFailure::from_error(
                        self.converter.name(),
                        fragment.href.clone(),
                        &e,
                    ));
                    String::new()
                }
            };

            let body = rewriter.rewrite(&converted);
            let path = fragments_dir.join(format!("{source}.tex"));
            write_atomic(&path, &fragment_source(fragment, &body))?;
            debug!(href = %fragment.href, role = %fragment.role, "fragment source written");
            written += 1;
        }

        let master = master_document(&self.info, self.page, subdir, &sequence.fragments);
        let master_path = self.latex.output_dir.join(&self.latex.master_file);
        write_atomic(&master_path, &master)?;
        report.outputs.push(OutputFile::describe(&master_path)?);

        info!(
            sources = written,
            master = %master_path.display(),
            "typesetting sources written"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use super::*;
    use crate::classify::classify;
    use crate::pipeline::{SilentProgress, assemble};
    use crate::zone::ZoneTracker;
    use bindery_shared::{BinderyError, BookConfig};

    const FIXTURE: &str = "../../../fixtures/epub/OEBPS/content.opf";

    /// Tag a list of file names the way the pipeline does.
    fn tagged(names: &[&str]) -> Vec<TaggedFragment> {
        let mut tracker = ZoneTracker::new();
        names
            .iter()
            .map(|name| {
                let role = classify(name);
                let transition = tracker.observe(role);
                TaggedFragment {
                    href: format!("xhtml/{name}"),
                    content: String::new(),
                    role,
                    zone: tracker.current(),
                    transition,
                    heading: None,
                }
            })
            .collect()
    }

    fn info() -> DocumentInfo {
        DocumentInfo {
            title: "Curls & Contemplation".into(),
            subtitle: Some("A Stylist's Interactive Journey".into()),
            author: Some("A. Stylist".into()),
            date: Some("2024".into()),
            language: "en".into(),
        }
    }

    /// Echoes an image reference so the rewrite is observable.
    struct StubConverter {
        fail: bool,
        calls: Cell<usize>,
    }

    impl MarkupConverter for StubConverter {
        fn name(&self) -> &str {
            "stub-pandoc"
        }

        fn convert(&self, markup: &str) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(BinderyError::tool("stub-pandoc", "exit status 1"));
            }
            Ok(format!(
                "\\includegraphics[width=\\textwidth]{{../images/brushstroke.svg}}\n% {} bytes\n",
                markup.len()
            ))
        }
    }

    struct StubVector;

    impl VectorConverter for StubVector {
        fn name(&self) -> &str {
            "stub-rsvg"
        }

        fn convert(&self, _svg: &Path, pdf: &Path) -> Result<()> {
            std::fs::write(pdf, b"%PDF").map_err(|e| BinderyError::io(pdf, e))
        }
    }

    #[test]
    fn book_structure_scenario() {
        let fragments = tagged(&[
            "1-TitlePage.xhtml",
            "2-Copyright.xhtml",
            "3-TableOfContents.xhtml",
            "4-Dedication.xhtml",
            "8-Part-I-Foundations.xhtml",
            "9-chapter-i-unveiling.xhtml",
            "10-chapter-ii-refining.xhtml",
            "33-Acknowledgments.xhtml",
            "44-bibliography.xhtml",
        ]);
        let body = document_body(&fragments, "latex");

        assert_eq!(body.matches("\\mainmatter").count(), 1);
        assert_eq!(body.matches("\\backmatter").count(), 1);
        assert_eq!(body.matches("\\part{").count(), 1);

        let main = body.find("\\mainmatter").expect("mainmatter");
        let dedication = body.find("\\input{latex/4-Dedication}").expect("dedication");
        let part = body.find("\\part{").expect("part");
        assert!(dedication < main && main < part);

        assert!(body.contains("\\backmatter\n\n\\chapter*{Acknowledgments}"));

        assert!(body.contains("\\input{latex/9-chapter-i-unveiling}\n\\clearpage\n"));
        assert!(body.contains("\\input{latex/10-chapter-ii-refining}\n\\clearpage\n"));
        assert!(!body.contains("\\input{latex/33-Acknowledgments}\n\\clearpage"));
        // title, copyright, toc, dedication, part, two chapters
        assert_eq!(body.matches("\\clearpage").count(), 7);
    }

    #[test]
    fn directives_per_role() {
        let mut fragments = tagged(&[
            "1-TitlePage.xhtml",
            "3-TableOfContents.xhtml",
            "8-Part-I-Foundations-of-Creative-Hairstyling.xhtml",
            "9-chapter-i-unveiling.xhtml",
            "34-AbouttheAuthor.xhtml",
            "40-SMARTGoals.xhtml",
        ]);
        fragments[3].heading = Some("Chapter I: Unveiling & Growing".into());

        let names = source_names(&fragments);
        let entries: Vec<_> = fragments
            .iter()
            .zip(&names)
            .map(|(f, source)| entry_for(f, "latex", source))
            .collect();
        assert_eq!(entries[0], "\\thispagestyle{empty}\n\\input{latex/1-TitlePage}\n");
        assert_eq!(entries[1], "\\tableofcontents\n");
        assert!(entries[2].starts_with("\\part{Part I Foundations of Creative Hairstyling}\n"));
        assert!(entries[3].contains("\\addcontentsline{toc}{chapter}{Chapter I: Unveiling \\& Growing}"));
        assert!(entries[4].starts_with("\\chapter*{About the Author}\n"));
        assert_eq!(entries[5], "\\input{latex/40-SMARTGoals}\n");
    }

    #[test]
    fn colliding_stems_get_distinct_sources() {
        let mut fragments = tagged(&["notes.xhtml", "notes.xhtml", "notes.xhtml", "notes.xhtml"]);
        fragments[0].href = "part1/notes.xhtml".into();
        fragments[1].href = "part2/notes.xhtml".into();
        fragments[2].href = "part2-notes.xhtml".into();
        fragments[3].href = "notes.html".into();

        assert_eq!(
            source_names(&fragments),
            ["notes", "part2-notes", "part2-notes-2", "notes-2"]
        );

        let body = document_body(&fragments, "latex");
        for input in ["notes", "part2-notes", "part2-notes-2", "notes-2"] {
            assert_eq!(body.matches(&format!("\\input{{latex/{input}}}\n")).count(), 1, "{input}");
        }
    }

    #[test]
    fn unique_stems_keep_their_names() {
        let fragments = tagged(&["1-TitlePage.xhtml", "9-chapter-i-unveiling.xhtml"]);
        assert_eq!(source_names(&fragments), ["1-TitlePage", "9-chapter-i-unveiling"]);
    }

    #[test]
    fn master_wraps_body() {
        let fragments = tagged(&["1-TitlePage.xhtml", "8-Part-I-X.xhtml"]);
        let master = master_document(&info(), &PageGeometry::default(), "latex", &fragments);

        assert!(master.starts_with("\\documentclass[11pt,twoside]{book}"));
        assert!(master.contains("paperwidth=432bp"));
        assert!(master.contains("inner=63bp"));
        assert!(master.contains("\\graphicspath{{latex/images/}}"));
        assert!(master.contains("pdftitle={Curls \\& Contemplation: A Stylist's Interactive Journey}"));
        assert!(master.contains("\\setdefaultlanguage{english}"));

        let begin = master.find("\\begin{document}").expect("begin");
        let front = master.find("\\frontmatter").expect("frontmatter");
        let main = master.find("\\mainmatter").expect("mainmatter");
        assert!(begin < front && front < main);
        assert!(master.trim_end().ends_with("\\end{document}"));
    }

    #[test]
    fn escapes_special_characters() {
        assert_eq!(escape_latex("Curls & Co."), "Curls \\& Co.");
        assert_eq!(escape_latex("50% off_now"), "50\\% off\\_now");
        assert_eq!(escape_latex("a\\b"), "a\\textbackslash{}b");
        assert_eq!(escape_latex("~^"), "\\textasciitilde{}\\textasciicircum{}");
    }

    #[test]
    fn language_mapping() {
        assert_eq!(polyglossia_language("en-US"), "english");
        assert_eq!(polyglossia_language("fr"), "french");
        assert_eq!(polyglossia_language("x-klingon"), "english");
    }

    fn run_fixture(converter: &StubConverter) -> (tempfile::TempDir, RunReport, LatexConfig) {
        let package = bindery_manifest::load_package(Path::new(FIXTURE)).expect("fixture");
        let out = tempfile::tempdir().expect("tempdir");
        let latex = LatexConfig {
            output_dir: out.path().join("pdf"),
            ..LatexConfig::default()
        };
        let paths = PathsConfig::default();
        let page = PageGeometry::default();

        let mut assembler = LatexAssembler {
            base_dir: &package.base_dir,
            paths: &paths,
            latex: &latex,
            page: &page,
            info: DocumentInfo::resolve(&BookConfig::default(), &package.metadata),
            converter,
            vector: &StubVector,
        };
        let report = assemble(&package, &mut assembler, &SilentProgress).expect("assemble");
        (out, report, latex)
    }

    #[test]
    fn fixture_writes_master_sources_and_assets() {
        let converter = StubConverter {
            fail: false,
            calls: Cell::new(0),
        };
        let (_out, report, latex) = run_fixture(&converter);
        assert!(report.succeeded(), "{:?}", report.failures);

        let fragments_dir = latex.output_dir.join("latex");
        let chapter = std::fs::read_to_string(
            fragments_dir.join("9-chapter-i-unveiling-your-creative-odyssey.tex"),
        )
        .expect("chapter source");
        assert!(chapter.starts_with("% 9-chapter-i-unveiling-your-creative-odyssey.xhtml\n% Type: chapter\n"));
        assert!(chapter.contains("\\includegraphics[width=\\textwidth]{latex/images/brushstroke}"));

        // No source for the table of contents; the engine builds it.
        assert!(!fragments_dir.join("3-TableOfContents.tex").exists());
        assert_eq!(converter.calls.get(), report.fragments - 1);

        assert!(fragments_dir.join("images/brushstroke.svg").is_file());
        assert!(fragments_dir.join("images/brushstroke.pdf").is_file());
        assert!(fragments_dir.join("fonts").is_dir());

        let master = report
            .output_named(&latex.master_file)
            .expect("master recorded");
        assert_eq!(master.sha256.len(), 64);
        let text = std::fs::read_to_string(&master.path).expect("master");
        assert!(text.contains("\\input{latex/44-bibliography}"));
        assert!(!text.contains("38-journal-page"));
        assert!(!text.contains("43-DoodlePage"));
    }

    #[test]
    fn converter_failures_are_recorded_per_fragment() {
        let converter = StubConverter {
            fail: true,
            calls: Cell::new(0),
        };
        let (_out, report, latex) = run_fixture(&converter);

        assert!(!report.succeeded());
        assert_eq!(report.failures.len(), report.fragments - 1);
        assert!(report.failures.iter().all(|f| f.tool == "stub-pandoc"));
        // Best-effort output is still produced.
        assert!(latex.output_dir.join(&latex.master_file).is_file());
    }
}
