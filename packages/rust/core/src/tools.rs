//! External collaborators: markup converter, print renderer, vector converter.
//!
//! Each tool sits behind a trait so the assemblers can be exercised without
//! the programs installed. The process-backed implementations are blocking
//! `std::process::Command` calls; a spawn error or non-zero exit status
//! becomes [`BinderyError::Tool`] carrying the tail of the tool's stderr.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tracing::{debug, instrument};

use bindery_shared::{BinderyError, Result, ToolsConfig};

/// Longest stderr excerpt kept in an error message.
const STDERR_TAIL: usize = 2000;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Converts an HTML fragment into typesetting-engine source.
pub trait MarkupConverter {
    fn name(&self) -> &str;
    fn convert(&self, markup: &str) -> Result<String>;
}

/// Renders combined markup plus a page stylesheet to a PDF.
pub trait PrintRenderer {
    fn name(&self) -> &str;
    fn render(&self, markup: &Path, stylesheet: &Path, output: &Path) -> Result<()>;
}

/// Converts one SVG file into a PDF the typesetting engine can include.
pub trait VectorConverter {
    fn name(&self) -> &str;
    fn convert(&self, svg: &Path, pdf: &Path) -> Result<()>;
}

// ---------------------------------------------------------------------------
// pandoc
// ---------------------------------------------------------------------------

/// `pandoc -f html -t latex --wrap=preserve`, stdin → stdout.
#[derive(Debug, Clone)]
pub struct PandocConverter {
    program: String,
}

impl PandocConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl MarkupConverter for PandocConverter {
    fn name(&self) -> &str {
        &self.program
    }

    #[instrument(skip_all, fields(tool = %self.program, bytes = markup.len()))]
    fn convert(&self, markup: &str) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(["-f", "html", "-t", "latex", "--wrap=preserve"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&self.program, e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| BinderyError::tool(&self.program, "failed to capture stdin"))?;

        // Feed stdin from a second thread so a full stdout pipe cannot deadlock us.
        let output = std::thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(markup.as_bytes()));
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));
            (output, written)
        });

        let output = match output {
            (Ok(output), Ok(())) => output,
            (Ok(output), Err(e)) if !output.status.success() => {
                debug!(error = %e, "stdin closed early");
                output
            }
            (Ok(_), Err(e)) => {
                return Err(BinderyError::tool(&self.program, format!("writing stdin: {e}")));
            }
            (Err(e), _) => {
                return Err(BinderyError::tool(&self.program, format!("waiting for exit: {e}")));
            }
        };

        check_status(&self.program, &output)?;
        String::from_utf8(output.stdout)
            .map_err(|e| BinderyError::tool(&self.program, format!("output is not UTF-8: {e}")))
    }
}

// ---------------------------------------------------------------------------
// WeasyPrint
// ---------------------------------------------------------------------------

/// `weasyprint -s <stylesheet> <markup> <output>`.
#[derive(Debug, Clone)]
pub struct WeasyPrintRenderer {
    program: String,
}

impl WeasyPrintRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl PrintRenderer for WeasyPrintRenderer {
    fn name(&self) -> &str {
        &self.program
    }

    #[instrument(skip_all, fields(tool = %self.program, output = %output.display()))]
    fn render(&self, markup: &Path, stylesheet: &Path, output: &Path) -> Result<()> {
        let result = Command::new(&self.program)
            .arg("-s")
            .arg(stylesheet)
            .arg(markup)
            .arg(output)
            .output()
            .map_err(|e| spawn_error(&self.program, e))?;

        check_status(&self.program, &result)
    }
}

// ---------------------------------------------------------------------------
// rsvg-convert
// ---------------------------------------------------------------------------

/// `rsvg-convert -f pdf -o <pdf> <svg>`.
#[derive(Debug, Clone)]
pub struct RsvgConverter {
    program: String,
}

impl RsvgConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl VectorConverter for RsvgConverter {
    fn name(&self) -> &str {
        &self.program
    }

    fn convert(&self, svg: &Path, pdf: &Path) -> Result<()> {
        let result = Command::new(&self.program)
            .args(["-f", "pdf", "-o"])
            .arg(pdf)
            .arg(svg)
            .output()
            .map_err(|e| spawn_error(&self.program, e))?;

        check_status(&self.program, &result)
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// The process-backed tools named in `[tools]`.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub converter: PandocConverter,
    pub renderer: WeasyPrintRenderer,
    pub vector: RsvgConverter,
}

impl Toolchain {
    pub fn from_config(tools: &ToolsConfig) -> Self {
        Self {
            converter: PandocConverter::new(&tools.converter),
            renderer: WeasyPrintRenderer::new(&tools.renderer),
            vector: RsvgConverter::new(&tools.vector_converter),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn spawn_error(program: &str, e: std::io::Error) -> BinderyError {
    BinderyError::tool(program, format!("could not start: {e}. Is `{program}` installed?"))
}

fn check_status(program: &str, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    let tail = match stderr.char_indices().rev().nth(STDERR_TAIL) {
        Some((i, _)) => &stderr[i..],
        None => stderr,
    };
    Err(BinderyError::tool(
        program,
        format!("exited with {}: {tail}", output.status),
    ))
}
