//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use bindery_core::assembler::latex::LatexAssembler;
use bindery_core::assembler::markup::MarkupAssembler;
use bindery_core::assembler::DocumentInfo;
use bindery_core::pipeline::{ProgressReporter, assemble};
use bindery_core::report::RunReport;
use bindery_core::tools::Toolchain;
use bindery_shared::{AppConfig, CONFIG_FILE_NAME, PageGeometry, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Bindery: assemble an EPUB source tree into a printable book.
#[derive(Parser)]
#[command(
    name = "bindery",
    version,
    about = "Assemble an EPUB source tree into a print-on-demand PDF or XeLaTeX sources.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ./bindery.toml, then ~/.bindery/bindery.toml).
    #[arg(long, global = true, env = "BINDERY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the print-on-demand PDF.
    Pdf,

    /// Write the XeLaTeX master document and per-fragment sources.
    Latex,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a config file with defaults to ./bindery.toml.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "bindery=info",
        1 => "bindery=debug",
        _ => "bindery=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let explicit = cli.config.as_deref();
    match cli.command {
        Command::Pdf => cmd_pdf(explicit),
        Command::Latex => cmd_latex(explicit),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(explicit),
        },
    }
}

// ---------------------------------------------------------------------------
// Build commands
// ---------------------------------------------------------------------------

fn cmd_pdf(explicit: Option<&Path>) -> Result<()> {
    let config = load_config(explicit)?;
    let package = bindery_manifest::load_package(&config.paths.package_path())?;
    let tools = Toolchain::from_config(&config.tools);

    info!(
        package = %config.paths.package_path().display(),
        output = %config.pdf.output.display(),
        "building print PDF"
    );

    let mut assembler = MarkupAssembler {
        base_dir: &package.base_dir,
        style_dir: &config.paths.style_dir,
        pdf: &config.pdf,
        info: DocumentInfo::resolve(&config.book, &package.metadata),
        renderer: &tools.renderer,
    };

    let reporter = CliProgress::new();
    let report = assemble(&package, &mut assembler, &reporter)?;

    println!();
    print_page_summary(&config.pdf.page);
    print_report(&report);
    println!();

    finish(&report)
}

fn cmd_latex(explicit: Option<&Path>) -> Result<()> {
    let config = load_config(explicit)?;
    let package = bindery_manifest::load_package(&config.paths.package_path())?;
    let tools = Toolchain::from_config(&config.tools);

    info!(
        package = %config.paths.package_path().display(),
        output_dir = %config.latex.output_dir.display(),
        "writing typesetting sources"
    );

    let mut assembler = LatexAssembler {
        base_dir: &package.base_dir,
        paths: &config.paths,
        latex: &config.latex,
        page: &config.pdf.page,
        info: DocumentInfo::resolve(&config.book, &package.metadata),
        converter: &tools.converter,
        vector: &tools.vector,
    };

    let reporter = CliProgress::new();
    let report = assemble(&package, &mut assembler, &reporter)?;

    println!();
    print_page_summary(&config.pdf.page);
    print_report(&report);
    println!();
    println!("  Typeset with (twice, for the table of contents):");
    println!(
        "    cd {} && xelatex {} && xelatex {}",
        config.latex.output_dir.display(),
        config.latex.master_file,
        config.latex.master_file
    );
    println!();

    finish(&report)
}

fn print_page_summary(page: &PageGeometry) {
    let (width, height) = page.trim_inches();
    let inch = |pt: f32| pt / 72.0;
    println!("  Trim:     {width}\" x {height}\"");
    println!(
        "  Margins:  inside {}\", outside {}\", top {}\", bottom {}\"",
        inch(page.margin_inside_pt),
        inch(page.margin_outside_pt),
        inch(page.margin_top_pt),
        inch(page.margin_bottom_pt),
    );
}

fn print_report(report: &RunReport) {
    println!("  Fragments: {}", report.fragments);
    if !report.skipped.is_empty() {
        println!("  Skipped:   {}", report.skipped.len());
        for skipped in &report.skipped {
            println!("    - {}: {}", skipped.href, skipped.reason);
        }
    }
    for output in &report.outputs {
        println!(
            "  Output:    {} ({:.2} MB)",
            output.path.display(),
            output.size_mb()
        );
        println!("  SHA-256:   {}", output.sha256);
    }
    if !report.failures.is_empty() {
        println!("  Failures:  {}", report.failures.len());
        for failure in &report.failures {
            println!("    - {} [{}]: {}", failure.subject, failure.tool, failure.message);
        }
    }
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
}

/// Non-zero exit when any external tool failed.
fn finish(report: &RunReport) -> Result<()> {
    if report.succeeded() {
        return Ok(());
    }
    Err(eyre!(
        "{} external tool failure(s) recorded; output is incomplete",
        report.failures.len()
    ))
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn fragment_processed(&self, href: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Reading [{current}/{total}] {href}"));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}

// An aborted run never reaches `done`.
impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = PathBuf::from(CONFIG_FILE_NAME);
    init_config(&path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(explicit: Option<&Path>) -> Result<()> {
    let config: AppConfig = load_config(explicit)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
