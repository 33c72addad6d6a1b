//! Package loading.
//!
//! Turns command-line patterns into a [`Program`]: the packages under analysis
//! plus every module-local package they import, transitively. Dependency
//! packages are parsed so their types can be resolved, but they are never
//! checked themselves.

mod module;
mod patterns;

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use tracing::{debug, warn};
use tree_sitter::{Parser, Tree};

pub use module::{parse_module_path, GoModule};
pub use patterns::{expand_patterns, Target};

use crate::config::{AnalyzerConfig, FileMatcher};
use crate::error::{ParseFailure, Result};
use crate::lang::Go;

/// A parsed Go source file.
pub struct SourceFile {
    /// Path as given on the command line (or resolved for dependencies).
    pub path: PathBuf,
    pub source: String,
    pub tree: Tree,
    pub package_name: String,
    pub is_test: bool,
}

impl SourceFile {
    pub fn bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }
}

impl std::fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFile")
            .field("path", &self.path)
            .field("package_name", &self.package_name)
            .field("is_test", &self.is_test)
            .finish()
    }
}

/// Files of one directory sharing a package clause.
#[derive(Debug)]
pub struct Package {
    pub name: String,
    pub import_path: String,
    pub dir: PathBuf,
    /// Sorted by path.
    pub files: Vec<SourceFile>,
    /// Whether diagnostics are reported for this package.
    pub analyzed: bool,
}

/// Everything loaded for one run.
#[derive(Debug, Default)]
pub struct Program {
    pub module: Option<GoModule>,
    pub packages: Vec<Package>,
    pub parse_failures: Vec<ParseFailure>,
}

impl Program {
    /// Packages under analysis, in load order.
    pub fn analyzed(&self) -> impl Iterator<Item = (usize, &Package)> {
        self.packages.iter().enumerate().filter(|(_, p)| p.analyzed)
    }

    /// Index of the non-test package with this import path.
    pub fn package_by_import_path(&self, import_path: &str) -> Option<usize> {
        self.packages
            .iter()
            .position(|p| p.import_path == import_path && !p.name.ends_with("_test"))
    }
}

/// Loads packages with a reusable parser.
pub struct Loader<'c> {
    go: Go,
    parser: Parser,
    config: &'c AnalyzerConfig,
    matcher: FileMatcher,
}

impl<'c> Loader<'c> {
    pub fn new(config: &'c AnalyzerConfig) -> Result<Self> {
        let go = Go;
        let parser = go.parser()?;
        let matcher = config.build_file_matcher()?;
        Ok(Self {
            go,
            parser,
            config,
            matcher,
        })
    }

    /// Load the packages named by `patterns` and their module-local imports.
    pub fn load(&mut self, patterns: &[String]) -> Result<Program> {
        let targets = expand_patterns(patterns)?;

        let module = targets
            .first()
            .and_then(|t| GoModule::discover(t.dir()))
            .or_else(|| std::env::current_dir().ok().and_then(|cwd| GoModule::discover(&cwd)));

        let mut program = Program {
            module,
            ..Program::default()
        };
        let mut loaded_dirs: FxHashSet<PathBuf> = FxHashSet::default();

        for target in &targets {
            let key = canonical(target.dir());
            if !loaded_dirs.insert(key) {
                continue;
            }
            let files = match target {
                Target::Dir(dir) => patterns::go_files_in(dir),
                Target::Files { files, .. } => files.clone(),
            };
            self.load_dir(&mut program, target.dir(), &files, true);
        }

        // Module-local imports, breadth first.
        let mut queue: VecDeque<usize> = (0..program.packages.len()).collect();
        while let Some(index) = queue.pop_front() {
            let Some(ref module) = program.module else {
                break;
            };
            let mut wanted = Vec::new();
            for file in &program.packages[index].files {
                for import in self.go.imports(&file.tree, file.bytes()) {
                    if let Some(dir) = module.resolve_import(&import.path) {
                        wanted.push(dir);
                    }
                }
            }

            for dir in wanted {
                if !loaded_dirs.insert(canonical(&dir)) {
                    continue;
                }
                let before = program.packages.len();
                let files = patterns::go_files_in(&dir);
                self.load_dir(&mut program, &dir, &files, false);
                queue.extend(before..program.packages.len());
            }
        }

        debug!(
            "loaded {} packages ({} analyzed), {} parse failures",
            program.packages.len(),
            program.analyzed().count(),
            program.parse_failures.len()
        );
        Ok(program)
    }

    /// Parse `files` of `dir` and append one package per package clause.
    fn load_dir(&mut self, program: &mut Program, dir: &Path, files: &[PathBuf], analyzed: bool) {
        let import_path = program
            .module
            .as_ref()
            .and_then(|m| m.import_path_of(&canonical(dir)))
            .unwrap_or_else(|| dir.display().to_string());

        let mut by_package: BTreeMap<String, Vec<SourceFile>> = BTreeMap::new();
        for path in files {
            let is_test = path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().ends_with("_test.go"));
            if is_test && (!analyzed || !self.config.include_tests) {
                continue;
            }
            if !self.matcher.is_included(path) {
                debug!("excluded {}", path.display());
                continue;
            }

            match self.parse_file(path, is_test) {
                Ok(Some(file)) => by_package.entry(file.package_name.clone()).or_default().push(file),
                Ok(None) => {}
                Err(failure) if analyzed => program.parse_failures.push(failure),
                Err(failure) => warn!("skipping dependency file {}", failure),
            }
        }

        for (name, mut files) in by_package {
            files.sort_by(|a, b| a.path.cmp(&b.path));
            let import_path = if name.ends_with("_test") {
                format!("{}_test", import_path)
            } else {
                import_path.clone()
            };
            program.packages.push(Package {
                name,
                import_path,
                dir: dir.to_path_buf(),
                files,
                analyzed,
            });
        }
    }

    /// Read and parse one file.
    ///
    /// `Ok(None)` means the file is deliberately skipped (`//go:build ignore`).
    fn parse_file(&mut self, path: &Path, is_test: bool) -> std::result::Result<Option<SourceFile>, ParseFailure> {
        let failure = |line: usize, column: usize, detail: String| ParseFailure {
            path: path.to_path_buf(),
            line,
            column,
            detail,
        };

        let bytes = std::fs::read(path).map_err(|e| failure(1, 1, format!("cannot read file: {}", e)))?;
        let source = String::from_utf8(bytes).map_err(|_| failure(1, 1, "file is not valid UTF-8".to_string()))?;

        if has_ignore_constraint(&source) {
            debug!("{} excluded by build constraint", path.display());
            return Ok(None);
        }

        let tree = self
            .go
            .parse(&mut self.parser, &source)
            .map_err(|e| failure(1, 1, e.to_string()))?;

        if let Some(node) = self.go.first_syntax_error(&tree) {
            let pos = node.start_position();
            let detail = if node.is_missing() {
                format!("syntax error: missing {}", node.kind())
            } else {
                "syntax error".to_string()
            };
            return Err(failure(pos.row + 1, pos.column + 1, detail));
        }

        let package_name = self
            .go
            .package_name(&tree, source.as_bytes())
            .ok_or_else(|| failure(1, 1, "expected 'package' clause".to_string()))?;

        Ok(Some(SourceFile {
            path: path.to_path_buf(),
            source,
            tree,
            package_name,
            is_test,
        }))
    }
}

fn canonical(dir: &Path) -> PathBuf {
    dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf())
}

/// `//go:build ignore` (or `// +build ignore`) before the package clause.
fn has_ignore_constraint(source: &str) -> bool {
    for line in source.lines() {
        let line = line.trim();
        if line.starts_with("package ") {
            return false;
        }
        let constraint = line
            .strip_prefix("//go:build")
            .or_else(|| line.strip_prefix("// +build"));
        if let Some(expr) = constraint {
            if expr.split(|c: char| c.is_whitespace() || c == '|' || c == '&' || c == ',')
                .any(|term| term == "ignore")
            {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn module_fixture() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(&root.join("go.mod"), "module example.com/app\n\ngo 1.22\n");
        write(
            &root.join("svc/svc.go"),
            "package svc\n\nimport \"example.com/app/pb\"\n\nvar P pb.Person\n",
        );
        write(&root.join("svc/svc_test.go"), "package svc\n\nfunc helper() {}\n");
        write(&root.join("pb/person.pb.go"), "package pb\n\ntype Person struct {\n\tId int64\n}\n");
        write(&root.join("pb/person_test.go"), "package pb\n");
        tmp
    }

    #[test]
    fn test_loads_module_local_imports_as_dependencies() {
        let tmp = module_fixture();
        let config = AnalyzerConfig::default();
        let mut loader = Loader::new(&config).unwrap();

        let svc = tmp.path().join("svc").display().to_string();
        let program = loader.load(&[svc]).unwrap();

        assert!(program.parse_failures.is_empty());
        let analyzed: Vec<&str> = program.analyzed().map(|(_, p)| p.name.as_str()).collect();
        assert_eq!(analyzed, vec!["svc"]);
        assert_eq!(program.packages[0].files.len(), 2);

        let pb = program.package_by_import_path("example.com/app/pb").unwrap();
        assert!(!program.packages[pb].analyzed);
        // Dependency test files are never loaded.
        assert_eq!(program.packages[pb].files.len(), 1);
    }

    #[test]
    fn test_tests_can_be_excluded() {
        let tmp = module_fixture();
        let config = AnalyzerConfig {
            include_tests: false,
            ..AnalyzerConfig::default()
        };
        let mut loader = Loader::new(&config).unwrap();
        let program = loader.load(&[tmp.path().join("svc").display().to_string()]).unwrap();
        assert_eq!(program.packages[0].files.len(), 1);
        assert!(!program.packages[0].files[0].is_test);
    }

    #[test]
    fn test_syntax_error_is_recorded_and_file_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("a.go"), "package a\n\nvar X = 1\n");
        write(&tmp.path().join("b.go"), "package a\n\nfunc broken( {\n");

        let config = AnalyzerConfig::default();
        let mut loader = Loader::new(&config).unwrap();
        let program = loader.load(&[tmp.path().display().to_string()]).unwrap();

        assert_eq!(program.parse_failures.len(), 1);
        assert!(program.parse_failures[0].path.ends_with("b.go"));
        assert!(program.parse_failures[0].detail.starts_with("syntax error"));
        assert_eq!(program.packages.len(), 1);
        assert_eq!(program.packages[0].files.len(), 1);
    }

    #[test]
    fn test_external_test_package_is_separate() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("a.go"), "package a\n");
        write(&tmp.path().join("a_test.go"), "package a_test\n");

        let config = AnalyzerConfig::default();
        let mut loader = Loader::new(&config).unwrap();
        let program = loader.load(&[tmp.path().display().to_string()]).unwrap();

        let names: Vec<&str> = program.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "a_test"]);
        assert!(program.packages[1].import_path.ends_with("_test"));
    }

    #[test]
    fn test_ignore_build_constraint() {
        assert!(has_ignore_constraint("//go:build ignore\n\npackage main\n"));
        assert!(has_ignore_constraint("// +build ignore\n\npackage main\n"));
        assert!(!has_ignore_constraint("//go:build linux\n\npackage main\n"));
        assert!(!has_ignore_constraint("package main\n//go:build ignore\n"));
    }
}
