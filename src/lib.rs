//! Static checker for mutation of immutable struct fields in Go code.
//!
//! A field is immutable when its protobuf descriptor carries the immutable
//! field option, when its struct tag says so, or when its comment mentions
//! it. Go sources are parsed with tree-sitter and resolved just far enough to
//! tell which struct field an assignment, indexed write, or inc/dec targets.

pub mod check;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod lang;
pub mod loader;
pub mod output;
pub mod types;

pub use check::{check_program, run, Diagnostic, Report};
pub use cli::{validate_cli_semantics, Cli};
pub use config::{
    discover_and_load_config, discover_config, AnalyzerConfig, ConfigError, FileConfig,
    FileMatcher, CONFIG_FILE_NAME,
};
pub use descriptor::{DecoderKind, DescriptorIndex};
pub use error::{exit_code, CheckError, ParseFailure, Result};
pub use output::{ColorMode, OutputFormat};
