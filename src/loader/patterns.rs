//! Command-line package patterns.
//!
//! Supported forms, following the `go` command:
//! - `./...`, `dir/...`: every package directory below `dir`
//! - `dir`: the package in `dir`
//! - `a.go b.go`: an ad-hoc package made of exactly these files

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::debug;

use crate::error::{CheckError, Result};

/// What one or more patterns expand to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// All `.go` files of a directory.
    Dir(PathBuf),
    /// Explicit files, all in the same directory.
    Files { dir: PathBuf, files: Vec<PathBuf> },
}

impl Target {
    pub fn dir(&self) -> &Path {
        match self {
            Target::Dir(dir) => dir,
            Target::Files { dir, .. } => dir,
        }
    }
}

/// Expand patterns into package targets, in a deterministic order.
pub fn expand_patterns(patterns: &[String]) -> Result<Vec<Target>> {
    let mut targets = Vec::new();
    let mut files_by_dir: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();

    for pattern in patterns {
        if let Some(base) = recursive_base(pattern) {
            let dirs = walk_package_dirs(&base);
            if dirs.is_empty() {
                return Err(CheckError::NoMatch(pattern.clone()));
            }
            debug!("{} expanded to {} packages", pattern, dirs.len());
            targets.extend(dirs.into_iter().map(Target::Dir));
            continue;
        }

        let path = PathBuf::from(pattern);
        if path.is_dir() {
            if !has_go_files(&path) {
                return Err(CheckError::NoMatch(pattern.clone()));
            }
            targets.push(Target::Dir(path));
        } else if path.is_file() && is_go_file(&path) {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            files_by_dir.entry(dir).or_default().push(path);
        } else {
            return Err(CheckError::NoMatch(pattern.clone()));
        }
    }

    for (dir, mut files) in files_by_dir {
        files.sort();
        files.dedup();
        targets.push(Target::Files { dir, files });
    }

    let mut seen = Vec::new();
    targets.retain(|t| {
        if seen.contains(t) {
            false
        } else {
            seen.push(t.clone());
            true
        }
    });
    Ok(targets)
}

/// Base directory of a `...` pattern.
fn recursive_base(pattern: &str) -> Option<PathBuf> {
    if pattern == "..." {
        return Some(PathBuf::from("."));
    }
    let base = pattern.strip_suffix("/...")?;
    Some(if base.is_empty() {
        PathBuf::from("/")
    } else {
        PathBuf::from(base)
    })
}

/// Directories below `base` (inclusive) that hold at least one `.go` file.
///
/// Skips `vendor`, `testdata`, and hidden or `_`-prefixed directories like the
/// `go` command does.
fn walk_package_dirs(base: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = WalkBuilder::new(base)
        .standard_filters(false)
        .hidden(true)
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !is_dir || !is_skipped_dir(&entry.file_name().to_string_lossy())
        })
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .filter(|entry| is_go_file(entry.path()))
        .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
        .collect();

    dirs.sort();
    dirs.dedup();
    dirs
}

fn is_skipped_dir(name: &str) -> bool {
    name == "vendor" || name == "testdata" || name.starts_with('.') || name.starts_with('_')
}

pub(crate) fn is_go_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "go")
}

/// `.go` files directly inside `dir`, sorted.
pub(crate) fn go_files_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        // Keep `main.go` rather than `./main.go` for the working directory.
        .map(|e| if dir == Path::new(".") { PathBuf::from(e.file_name()) } else { e.path() })
        .filter(|p| p.is_file() && is_go_file(p))
        .filter(|p| {
            !p.file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with(['.', '_']))
        })
        .collect();
    files.sort();
    files
}

fn has_go_files(dir: &Path) -> bool {
    !go_files_in(dir).is_empty()
}
