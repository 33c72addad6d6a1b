//! CLI argument definitions and validation.
//!
//! Kept out of `main.rs` so tests can drive [`Cli::try_parse_from`] without
//! spawning a process.

use std::path::PathBuf;

use clap::Parser;

use crate::config::AnalyzerConfig;
use crate::descriptor::DecoderKind;
use crate::output::{ColorMode, OutputFormat};

/// immutablecheck: report mutation of immutable struct fields in Go code.
///
/// A field is immutable when its protobuf descriptor carries the immutable
/// field option, when its struct tag is `immutable:"true"` or
/// `immutable:"1"`, or when its comment mentions "immutable".
#[derive(Parser, Debug)]
#[command(name = "immutablecheck")]
#[command(version)]
#[command(about = "Report mutation of immutable struct fields in Go code", long_about = None)]
#[command(after_help = "\
CONFIGURATION:
  immutablecheck looks for a .immutablecheck.toml config file, searching from
  the current directory up to the nearest .git root. CLI flags always override
  config file settings.

EXAMPLES:
  immutablecheck ./...                         Check every package in the module
  immutablecheck ./cmd/server                  Check one package
  immutablecheck --descriptor gen/all.pb ./... Use an explicit descriptor set
  immutablecheck --dump-descriptor gen/all.pb  Print immutable fields of a descriptor

EXIT STATUS:
  0 no findings, 1 load or parse errors, 2 configuration errors, 3 findings")]
pub struct Cli {
    /// Packages to check: `./...`, `dir/...`, directories or `.go` files.
    #[arg(required_unless_present = "dump_descriptor")]
    pub patterns: Vec<String>,

    /// Descriptor set to try before the conventional locations (repeatable).
    #[arg(long = "descriptor", value_name = "PATH")]
    pub descriptors: Vec<PathBuf>,

    /// How to recognize the immutable option in field options.
    #[arg(long, value_enum, value_name = "DECODER")]
    pub option_decoder: Option<DecoderKind>,

    /// Package name treated as generated protobuf code (repeatable).
    ///
    /// Replaces the configured list when given.
    #[arg(long = "generated-package", value_name = "NAME")]
    pub generated_packages: Vec<String>,

    /// Analyze `_test.go` files (default).
    #[arg(long, overrides_with = "no_tests")]
    pub tests: bool,

    /// Skip `_test.go` files.
    #[arg(long, overrides_with = "tests")]
    pub no_tests: bool,

    /// Output format. Overrides `[output] format`.
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Decode a descriptor set, print its immutable fields as JSON, and exit.
    #[arg(long, value_name = "PATH")]
    pub dump_descriptor: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, help_heading = "Global Options")]
    pub debug: bool,

    /// When to use ANSI color in text output.
    #[arg(long, value_enum, default_value = "auto", help_heading = "Global Options")]
    pub color: ColorMode,

    /// Only print diagnostics and errors.
    #[arg(short, long, help_heading = "Global Options")]
    pub quiet: bool,

    /// Show progress details.
    #[arg(short, long, help_heading = "Global Options")]
    pub verbose: bool,

    /// Path to a .immutablecheck.toml config file.
    ///
    /// Overrides discovery from the current directory.
    #[arg(long, value_name = "PATH", help_heading = "Global Options")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// `Some(include)` when `--tests` or `--no-tests` was given.
    pub fn tests_override(&self) -> Option<bool> {
        if self.no_tests {
            Some(false)
        } else if self.tests {
            Some(true)
        } else {
            None
        }
    }

    /// Apply flags on top of a config already merged from the file.
    pub fn apply_to(&self, config: &mut AnalyzerConfig) {
        // CLI descriptors are tried before file ones.
        if !self.descriptors.is_empty() {
            let mut paths = self.descriptors.clone();
            paths.append(&mut config.descriptor_paths);
            config.descriptor_paths = paths;
        }
        if let Some(decoder) = self.option_decoder {
            config.decoder = decoder;
        }
        if !self.generated_packages.is_empty() {
            config.generated_packages = self.generated_packages.clone();
        }
        if let Some(include) = self.tests_override() {
            config.include_tests = include;
        }
    }
}

/// Semantic checks clap cannot express. Returns warnings, never fails.
pub fn validate_cli_semantics(cli: &Cli) -> Vec<String> {
    let mut warnings = Vec::new();

    if cli.quiet && cli.verbose {
        warnings.push(
            "Warning: --quiet and --verbose are contradictory; --quiet takes precedence".to_string(),
        );
    }

    if cli.dump_descriptor.is_some() && !cli.patterns.is_empty() {
        warnings.push("Warning: patterns are ignored with --dump-descriptor".to_string());
    }

    for path in &cli.descriptors {
        if !path.exists() {
            warnings.push(format!(
                "Warning: --descriptor path '{}' does not exist",
                path.display()
            ));
        }
    }

    warnings
}
