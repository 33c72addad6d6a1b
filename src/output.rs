//! Output formatting for check results.
//!
//! - **Text**: `path:line:col: message` on stderr, optional color
//! - **JSON**: one document on stdout for machine consumption
//! - **GitHub**: `::error` annotations on stdout for GitHub Actions
//!
//! Color support respects `NO_COLOR`, `FORCE_COLOR`, and terminal detection.

use std::io::{self, IsTerminal, Write};
use std::str::FromStr;
use std::sync::OnceLock;

use clap::ValueEnum;
use serde::Serialize;

use crate::check::{Diagnostic, Report};
use crate::descriptor::DescriptorIndex;
use crate::error::ParseFailure;

// ============================================================================
// COLOR CONFIGURATION
// ============================================================================

/// Controls when ANSI color codes are emitted.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum ColorMode {
    /// Enable color when stderr is a terminal and `NO_COLOR` is unset.
    #[default]
    Auto,
    /// Always emit ANSI color codes, even when piped.
    Always,
    /// Never emit ANSI color codes.
    Never,
}

/// Resolved color decision with accessors that return either the escape
/// sequence or an empty string.
#[derive(Debug, Clone, Copy)]
pub struct ColorConfig {
    enabled: bool,
}

impl ColorConfig {
    /// Resolve a `ColorMode` into a concrete on/off decision.
    ///
    /// Precedence (highest to lowest):
    /// 1. `ColorMode::Always` / `ColorMode::Never`
    /// 2. `FORCE_COLOR` env var (non-empty and not "0" = on)
    /// 3. `NO_COLOR` env var (any value = off)
    /// 4. whether stderr is a terminal
    pub fn from_mode(mode: ColorMode) -> Self {
        let enabled = match mode {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                if let Ok(val) = std::env::var("FORCE_COLOR") {
                    if !val.is_empty() && val != "0" {
                        return Self { enabled: true };
                    }
                }
                if std::env::var_os("NO_COLOR").is_some() {
                    return Self { enabled: false };
                }
                io::stderr().is_terminal()
            }
        };
        Self { enabled }
    }

    pub fn plain() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn reset(&self) -> &'static str { if self.enabled { "\x1b[0m" } else { "" } }
    pub fn bold(&self) -> &'static str { if self.enabled { "\x1b[1m" } else { "" } }
    pub fn red(&self) -> &'static str { if self.enabled { "\x1b[31m" } else { "" } }
    pub fn yellow(&self) -> &'static str { if self.enabled { "\x1b[33m" } else { "" } }
    pub fn gray(&self) -> &'static str { if self.enabled { "\x1b[90m" } else { "" } }
}

/// Process-wide color configuration, initialized once at startup.
static COLOR: OnceLock<ColorConfig> = OnceLock::new();

/// Set the global color mode. First call wins.
pub fn init_color(mode: ColorMode) {
    let _ = COLOR.set(ColorConfig::from_mode(mode));
}

/// The active `ColorConfig`, auto-detected if `init_color` was never called.
pub fn color_config() -> &'static ColorConfig {
    COLOR.get_or_init(|| ColorConfig::from_mode(ColorMode::Auto))
}

// ============================================================================
// OUTPUT FORMAT
// ============================================================================

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// `path:line:col: message` lines on stderr.
    #[default]
    Text,
    /// JSON document on stdout.
    Json,
    /// GitHub Actions annotations on stdout.
    Github,
}

impl FromStr for OutputFormat {
    type Err = String;

    /// Accepts the names used in `[output] format`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "github" => Ok(OutputFormat::Github),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

// ============================================================================
// PRINTING
// ============================================================================

/// Write `report` in `format` to the stream that format belongs on.
pub fn print_report(report: &Report, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Text => {
            let stderr = io::stderr();
            let mut w = stderr.lock();
            print_text(&mut w, report, color_config())
        }
        OutputFormat::Json => {
            let stdout = io::stdout();
            let mut w = stdout.lock();
            // Parse failures stay on stderr in driver format for every format.
            print_parse_failures(&mut io::stderr().lock(), &report.parse_failures, color_config())?;
            print_json(&mut w, report)
        }
        OutputFormat::Github => {
            let stdout = io::stdout();
            let mut w = stdout.lock();
            print_parse_failures(&mut io::stderr().lock(), &report.parse_failures, color_config())?;
            print_github(&mut w, report)
        }
    }
}

/// Driver-style text: parse failures first, then diagnostics in load order.
pub fn print_text<W: Write>(w: &mut W, report: &Report, colors: &ColorConfig) -> io::Result<()> {
    print_parse_failures(w, &report.parse_failures, colors)?;
    for diag in &report.diagnostics {
        print_diagnostic(w, diag, colors)?;
    }
    Ok(())
}

fn print_diagnostic<W: Write>(w: &mut W, diag: &Diagnostic, c: &ColorConfig) -> io::Result<()> {
    writeln!(
        w,
        "{}{}:{}:{}:{} {}{}{}",
        c.bold(),
        diag.path.display(),
        diag.line,
        diag.column,
        c.reset(),
        c.red(),
        diag.message,
        c.reset()
    )
}

pub fn print_parse_failures<W: Write>(w: &mut W, failures: &[ParseFailure], c: &ColorConfig) -> io::Result<()> {
    for failure in failures {
        writeln!(
            w,
            "{}{}:{}:{}:{} {}{}{}",
            c.bold(),
            failure.path.display(),
            failure.line,
            failure.column,
            c.reset(),
            c.yellow(),
            failure.detail,
            c.reset()
        )?;
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonParseFailure<'a> {
    path: &'a std::path::Path,
    line: usize,
    column: usize,
    message: &'a str,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    diagnostics: &'a [Diagnostic],
    parse_failures: Vec<JsonParseFailure<'a>>,
    packages_analyzed: usize,
}

pub fn print_json<W: Write>(w: &mut W, report: &Report) -> io::Result<()> {
    let doc = JsonReport {
        diagnostics: &report.diagnostics,
        parse_failures: report
            .parse_failures
            .iter()
            .map(|f| JsonParseFailure {
                path: &f.path,
                line: f.line,
                column: f.column,
                message: &f.detail,
            })
            .collect(),
        packages_analyzed: report.packages_analyzed,
    };
    serde_json::to_writer_pretty(&mut *w, &doc)?;
    writeln!(w)
}

/// Escape a string for a GitHub Actions workflow command.
fn github_escape(s: &str) -> String {
    s.replace('%', "%25")
        .replace('\n', "%0A")
        .replace('\r', "%0D")
}

/// Format: `::error file=F,line=L,col=C,title=immutablecheck::MESSAGE`
pub fn print_github<W: Write>(w: &mut W, report: &Report) -> io::Result<()> {
    for diag in &report.diagnostics {
        writeln!(
            w,
            "::error file={},line={},col={},title=immutablecheck::{}",
            diag.path.display(),
            diag.line,
            diag.column,
            github_escape(&diag.message),
        )?;
    }
    Ok(())
}

/// Print a decoded descriptor index as JSON, for `--dump-descriptor`.
pub fn print_descriptor_index<W: Write>(w: &mut W, index: &DescriptorIndex) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *w, index)?;
    writeln!(w)
}
