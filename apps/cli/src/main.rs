//! Bindery CLI: print-ready book assembly from an EPUB source tree.
//!
//! Builds either a print-on-demand PDF (through a browser-based print
//! renderer) or a XeLaTeX source tree from the package spine.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
