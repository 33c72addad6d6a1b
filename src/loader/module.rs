//! `go.mod` discovery and module-local import resolution.

use std::path::{Path, PathBuf};

use tracing::debug;

/// A Go module: the directory holding `go.mod` and its declared path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoModule {
    pub root: PathBuf,
    pub path: String,
}

impl GoModule {
    /// Find the nearest `go.mod` at or above `start`.
    pub fn discover(start: &Path) -> Option<Self> {
        let start = start.canonicalize().ok()?;
        let mut current = if start.is_file() {
            start.parent()?.to_path_buf()
        } else {
            start
        };

        loop {
            let candidate = current.join("go.mod");
            if candidate.is_file() {
                let contents = std::fs::read_to_string(&candidate).ok()?;
                let path = parse_module_path(&contents)?;
                debug!("module {} at {}", path, current.display());
                return Some(Self {
                    root: current,
                    path,
                });
            }
            match current.parent() {
                Some(parent) if parent != current => current = parent.to_path_buf(),
                _ => return None,
            }
        }
    }

    /// Import path of a directory inside the module.
    pub fn import_path_of(&self, dir: &Path) -> Option<String> {
        let rel = dir.strip_prefix(&self.root).ok()?;
        let mut path = self.path.clone();
        for component in rel.components() {
            path.push('/');
            path.push_str(&component.as_os_str().to_string_lossy());
        }
        Some(path)
    }

    /// Directory of an import path, if it is part of this module or vendored.
    pub fn resolve_import(&self, import_path: &str) -> Option<PathBuf> {
        if import_path == self.path {
            return Some(self.root.clone());
        }
        if let Some(rest) = import_path
            .strip_prefix(self.path.as_str())
            .and_then(|r| r.strip_prefix('/'))
        {
            let dir = self.root.join(rest);
            return dir.is_dir().then_some(dir);
        }
        let vendored = self.root.join("vendor").join(import_path);
        vendored.is_dir().then_some(vendored)
    }
}

/// Extract the module path from `go.mod` contents.
pub fn parse_module_path(contents: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let line = line.split("//").next().unwrap_or("").trim();
        let rest = line.strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) && !rest.starts_with('"') {
            return None;
        }
        let path = rest.trim().trim_matches(|c| c == '"' || c == '`');
        (!path.is_empty()).then(|| path.to_string())
    })
}
