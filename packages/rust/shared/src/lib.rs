//! Shared types, error model, and configuration for Bindery.
//!
//! This crate is the foundation depended on by all other Bindery crates.
//! It provides:
//! - [`BinderyError`]: the unified error type
//! - Domain types ([`StructuralRole`], [`MatterZone`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BookConfig, CONFIG_FILE_NAME, LatexConfig, PageGeometry, PathsConfig, PdfConfig,
    ToolsConfig, init_config, load_config, load_config_from, user_config_path,
};
pub use error::{BinderyError, Result};
pub use types::{MatterZone, StructuralRole};
