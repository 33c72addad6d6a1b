//! The immutable-field check.
//!
//! Per analyzed package: locate the descriptor, scan local markers, build the
//! registry, then scan every file for mutations. Each package gets a fresh
//! registry; nothing is shared between packages except the type graph.

pub mod markers;
pub mod mutation;
pub mod registry;

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};

pub use markers::{FieldMarker, MarkerOrigin, MarkerRules};
pub use mutation::{Detection, MutationEvent, MutationKind, MutationScanner};
pub use registry::{matches_descriptor_name, snake_to_camel, ImmutableFieldRegistry};

use crate::config::AnalyzerConfig;
use crate::descriptor;
use crate::error::{exit_code, ParseFailure, Result};
use crate::loader::{Loader, Program};
use crate::types::{self, PackageId, TypeGraph};

/// A reported mutation of an immutable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub field: String,
    pub owner: String,
    pub kind: MutationKind,
    pub detection: Detection,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.path.display(),
            self.line,
            self.column,
            self.message
        )
    }
}

/// Result of a run.
#[derive(Debug, Default)]
pub struct Report {
    pub diagnostics: Vec<Diagnostic>,
    pub parse_failures: Vec<ParseFailure>,
    pub packages_analyzed: usize,
    /// Descriptor used by each package that found one.
    pub descriptors: Vec<PathBuf>,
}

impl Report {
    /// Process exit status. Load failures outrank findings.
    pub fn exit_code(&self) -> i32 {
        if !self.parse_failures.is_empty() {
            exit_code::LOAD_ERROR
        } else if !self.diagnostics.is_empty() {
            exit_code::DIAGNOSTICS
        } else {
            exit_code::CLEAN
        }
    }

    /// Record a descriptor used by some package, once, in first-use order.
    fn add_descriptor(&mut self, path: PathBuf) {
        if !self.descriptors.contains(&path) {
            self.descriptors.push(path);
        }
    }
}

/// Load `patterns` and check every package they name.
pub fn run(patterns: &[String], config: &AnalyzerConfig) -> Result<Report> {
    let mut loader = Loader::new(config)?;
    let program = loader.load(patterns)?;
    Ok(check_program(program, config))
}

/// Check the analyzed packages of an already loaded program.
pub fn check_program(program: Program, config: &AnalyzerConfig) -> Report {
    let graph = types::build(&program);
    let analyzer = Analyzer::new(&graph, config);

    let mut report = Report::default();
    for (index, package) in program.analyzed() {
        let id = PackageId(index as u32);
        let (descriptor, diagnostics) = analyzer.check_package(&program, id);
        debug!(
            "package {}: {} diagnostics",
            package.import_path,
            diagnostics.len()
        );
        report.diagnostics.extend(diagnostics);
        if let Some(path) = descriptor {
            report.add_descriptor(path);
        }
        report.packages_analyzed += 1;
    }
    report.parse_failures = program.parse_failures;

    info!(
        "checked {} packages: {} diagnostics, {} parse failures",
        report.packages_analyzed,
        report.diagnostics.len(),
        report.parse_failures.len()
    );
    report
}

/// Per-package driver over a shared type graph.
pub struct Analyzer<'a> {
    graph: &'a TypeGraph,
    config: &'a AnalyzerConfig,
    rules: MarkerRules,
}

impl<'a> Analyzer<'a> {
    pub fn new(graph: &'a TypeGraph, config: &'a AnalyzerConfig) -> Self {
        Self {
            graph,
            config,
            rules: MarkerRules::from_config(config),
        }
    }

    /// Check one package. Returns the descriptor path used, if any.
    pub fn check_package(&self, program: &Program, id: PackageId) -> (Option<PathBuf>, Vec<Diagnostic>) {
        let package = &program.packages[id.index()];

        let candidates = descriptor::candidate_paths(&self.config.descriptor_paths, &package.dir);
        let decoder = self.config.decoder.build(self.config.option_number);
        let (descriptor_path, index) = match descriptor::locate(&candidates, decoder.as_ref()) {
            Some((path, index)) => (Some(path), Some(index)),
            None => (None, None),
        };

        let markers: Vec<FieldMarker> = package
            .files
            .iter()
            .enumerate()
            .flat_map(|(i, file)| markers::scan_file(self.graph, id, i, file, &self.rules))
            .collect();
        let registry = ImmutableFieldRegistry::build(self.graph, id, markers, index);

        let scanner = MutationScanner::new(self.graph, &registry, self.config, id);
        let mut diagnostics = Vec::new();
        for (i, file) in package.files.iter().enumerate() {
            for event in scanner.scan_file(i, file) {
                diagnostics.push(Diagnostic {
                    path: file.path.clone(),
                    line: event.line,
                    column: event.column,
                    message: event.message(),
                    field: event.field_name,
                    owner: event.owner_type_name,
                    kind: event.kind,
                    detection: event.detection,
                });
            }
        }

        (descriptor_path, diagnostics)
    }
}
