//! Error types for immutablecheck.
//!
//! Uses `thiserror` for `Display` and `From` implementations. Descriptor and
//! config errors live next to their modules; this file holds the errors that
//! can abort a whole run, plus the per-file [`ParseFailure`].

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

/// Process exit codes for the immutablecheck CLI.
///
/// Mirrors the go analysis driver: load failures exit 1, findings exit 3.
pub mod exit_code {
    /// No findings, every file loaded.
    pub const CLEAN: i32 = 0;
    /// A file or package could not be read or parsed.
    pub const LOAD_ERROR: i32 = 1;
    /// Bad config file or invalid CLI arguments.
    pub const CONFIG_ERROR: i32 = 2;
    /// At least one immutable-field diagnostic was reported.
    pub const DIAGNOSTICS: i32 = 3;
}

/// Main error type for loading and checking Go packages.
#[derive(Error, Debug)]
pub enum CheckError {
    /// Tree-sitter refused the Go grammar or returned no tree.
    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),

    /// A command-line pattern did not match any Go file.
    #[error("pattern {0:?} matched no Go files")]
    NoMatch(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Convenience type alias for Results using CheckError.
pub type Result<T> = std::result::Result<T, CheckError>;

/// A file that was excluded from analysis because it failed to parse.
///
/// Parse failures are fatal for the file's own contribution only; the rest of
/// the package is still checked and the failure is surfaced to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
    pub detail: String,
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.path.display(),
            self.line,
            self.column,
            self.detail
        )
    }
}
