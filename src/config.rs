//! `.immutablecheck.toml` configuration file support.
//!
//! Provides deserialization, discovery (walk up to `.git` root), and the
//! runtime [`AnalyzerConfig`] the checker consumes. CLI flags always take
//! precedence over file config; the merge happens in `main`.
//!
//! # Example config
//!
//! ```toml
//! [descriptor]
//! paths = ["proto/gen/all.protos.pb"]
//! option_number = 59527
//! decoder = "scan"
//!
//! [markers]
//! tag_key = "immutable"
//! truthy_values = ["true", "1"]
//! comment_marker = "immutable"
//!
//! [generated]
//! package_names = ["pb"]
//! path_suffixes = ["pb"]
//!
//! [files]
//! tests = true
//! exclude = ["**/*_mock.go"]
//!
//! [output]
//! format = "text"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::descriptor::{DecoderKind, IMMUTABLE_OPTION_NUMBER};

/// Name of the config file.
pub const CONFIG_FILE_NAME: &str = ".immutablecheck.toml";

/// Top-level `.immutablecheck.toml` configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub descriptor: DescriptorConfig,

    #[serde(default)]
    pub markers: MarkersConfig,

    #[serde(default)]
    pub generated: GeneratedConfig,

    #[serde(default)]
    pub files: FilesConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Where to find the descriptor set and how to read its options.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DescriptorConfig {
    /// Paths tried before the conventional `pb/descriptor/all.protos.pb`
    /// locations. Relative paths resolve against the working directory.
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Field number of the immutability extension (default 59527).
    #[serde(default)]
    pub option_number: Option<u32>,

    /// `"fixed"` or `"scan"`.
    #[serde(default)]
    pub decoder: Option<DecoderKind>,
}

/// Struct tag and comment markers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MarkersConfig {
    #[serde(default)]
    pub tag_key: Option<String>,

    #[serde(default)]
    pub truthy_values: Option<Vec<String>>,

    #[serde(default)]
    pub comment_marker: Option<String>,
}

/// How generated protobuf packages are recognized.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GeneratedConfig {
    /// Go package names treated as generated code.
    #[serde(default)]
    pub package_names: Option<Vec<String>>,

    /// Import path suffixes (`.../<suffix>`) treated as generated code.
    #[serde(default)]
    pub path_suffixes: Option<Vec<String>>,
}

/// Which Go files are analyzed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FilesConfig {
    /// Include `_test.go` files (default: true).
    #[serde(default)]
    pub tests: Option<bool>,

    /// Glob patterns for files to skip.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Output settings (can be overridden by CLI flags).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Output format: "text", "json", "github".
    #[serde(default)]
    pub format: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

impl FileConfig {
    /// Parse a `.immutablecheck.toml` file from a string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Parse)
    }

    /// Load a `.immutablecheck.toml` file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate semantic constraints that TOML schema cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(number) = self.descriptor.option_number {
            // Field numbers are 29 bits; 19000..=19999 is reserved by protobuf.
            if number == 0 || number > 0x1FFF_FFFF || (19000..=19999).contains(&number) {
                return Err(ConfigError::InvalidOptionNumber(number));
            }
        }

        if let Some(ref key) = self.markers.tag_key {
            if key.is_empty() || key.contains([' ', ':', '"', '`']) {
                return Err(ConfigError::InvalidTagKey(key.clone()));
            }
        }
        if let Some(ref values) = self.markers.truthy_values {
            if values.is_empty() {
                return Err(ConfigError::EmptyList("markers.truthy_values"));
            }
        }
        if let Some(ref marker) = self.markers.comment_marker {
            if marker.trim().is_empty() {
                return Err(ConfigError::EmptyMarker);
            }
        }

        for pattern in &self.files.exclude {
            globset::Glob::new(pattern)
                .map_err(|e| ConfigError::InvalidGlob(pattern.clone(), e.to_string()))?;
        }

        if let Some(ref fmt) = self.output.format {
            if !["text", "json", "github"].contains(&fmt.as_str()) {
                return Err(ConfigError::InvalidFormat(fmt.clone()));
            }
        }

        Ok(())
    }

    /// Generate a default `.immutablecheck.toml` config as a string.
    pub fn default_toml() -> &'static str {
        r#"# immutablecheck configuration file

# Descriptor set lookup. Explicit paths are tried before
# pb/descriptor/all.protos.pb relative to the working and package directories.
[descriptor]
# paths = ["proto/gen/all.protos.pb"]
# option_number = 59527
# decoder = "fixed"   # or "scan"

# Struct tag and comment markers.
[markers]
# tag_key = "immutable"
# truthy_values = ["true", "1"]
# comment_marker = "immutable"

# Packages holding generated protobuf code.
[generated]
# package_names = ["pb"]
# path_suffixes = ["pb"]

[files]
# tests = true
# exclude = ["**/*_mock.go"]

[output]
# format = "text"
"#
    }

    /// Apply file settings on top of `base`.
    pub fn apply_to(&self, base: &mut AnalyzerConfig) {
        base.descriptor_paths.extend(self.descriptor.paths.iter().cloned());
        if let Some(number) = self.descriptor.option_number {
            base.option_number = number;
        }
        if let Some(decoder) = self.descriptor.decoder {
            base.decoder = decoder;
        }
        if let Some(ref key) = self.markers.tag_key {
            base.tag_key = key.clone();
        }
        if let Some(ref values) = self.markers.truthy_values {
            base.truthy_values = values.clone();
        }
        if let Some(ref marker) = self.markers.comment_marker {
            base.comment_marker = marker.clone();
        }
        if let Some(ref names) = self.generated.package_names {
            base.generated_packages = names.clone();
        }
        if let Some(ref suffixes) = self.generated.path_suffixes {
            base.generated_path_suffixes = suffixes.clone();
        }
        if let Some(tests) = self.files.tests {
            base.include_tests = tests;
        }
        base.exclude.extend(self.files.exclude.iter().cloned());
    }
}

// ---------------------------------------------------------------------------
// Runtime config
// ---------------------------------------------------------------------------

/// Everything the checker needs to know, after merging file and CLI settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    pub descriptor_paths: Vec<PathBuf>,
    pub option_number: u32,
    pub decoder: DecoderKind,
    pub tag_key: String,
    pub truthy_values: Vec<String>,
    pub comment_marker: String,
    pub generated_packages: Vec<String>,
    pub generated_path_suffixes: Vec<String>,
    pub include_tests: bool,
    pub exclude: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            descriptor_paths: Vec::new(),
            option_number: IMMUTABLE_OPTION_NUMBER,
            decoder: DecoderKind::Fixed,
            tag_key: "immutable".to_string(),
            truthy_values: vec!["true".to_string(), "1".to_string()],
            comment_marker: "immutable".to_string(),
            generated_packages: vec!["pb".to_string()],
            generated_path_suffixes: vec!["pb".to_string()],
            include_tests: true,
            exclude: Vec::new(),
        }
    }
}

impl AnalyzerConfig {
    /// Whether a package is treated as generated protobuf code.
    ///
    /// This is a naming heuristic: it matches by package name or import path
    /// suffix, not by type identity, so detections through it carry lower
    /// confidence than local markers.
    pub fn is_generated_package(&self, name: &str, import_path: &str) -> bool {
        if self.generated_packages.iter().any(|p| p == name) {
            return true;
        }
        self.generated_path_suffixes.iter().any(|suffix| {
            import_path == suffix.as_str()
                || import_path
                    .strip_suffix(suffix.as_str())
                    .is_some_and(|rest| rest.ends_with('/'))
        })
    }

    pub fn build_file_matcher(&self) -> Result<FileMatcher, ConfigError> {
        FileMatcher::new(&self.exclude)
    }
}

// ---------------------------------------------------------------------------
// File matching
// ---------------------------------------------------------------------------

/// Compiled glob matcher for excluded files.
pub struct FileMatcher {
    exclude: Option<globset::GlobSet>,
}

impl FileMatcher {
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        if patterns.is_empty() {
            return Ok(Self { exclude: None });
        }
        let mut builder = globset::GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(
                globset::Glob::new(pattern)
                    .map_err(|e| ConfigError::InvalidGlob(pattern.clone(), e.to_string()))?,
            );
        }
        let set = builder
            .build()
            .map_err(|e| ConfigError::InvalidGlob("(build)".into(), e.to_string()))?;
        Ok(Self { exclude: Some(set) })
    }

    pub fn is_included(&self, path: &Path) -> bool {
        match self.exclude {
            Some(ref exclude) => !exclude.is_match(path),
            None => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Config file discovery
// ---------------------------------------------------------------------------

/// Discover a `.immutablecheck.toml` by walking up from `start_dir` to the
/// repository root (directory containing `.git`).
pub fn discover_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current = if start_dir.is_file() {
        start_dir.parent()?.to_path_buf()
    } else {
        start_dir.to_path_buf()
    };

    loop {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }

        if current.join(".git").exists() {
            return None;
        }

        match current.parent() {
            Some(parent) if parent != current => {
                current = parent.to_path_buf();
            }
            _ => return None,
        }
    }
}

/// Discover and load the config file, returning the parsed config and
/// its path. Returns `Ok(None)` if no config file is found.
pub fn discover_and_load_config(
    start_dir: &Path,
) -> Result<Option<(FileConfig, PathBuf)>, ConfigError> {
    match discover_config(start_dir) {
        Some(path) => {
            let config = FileConfig::load(&path)?;
            Ok(Some((config, path)))
        }
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from config file operations.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading the config file.
    Io(PathBuf, std::io::Error),
    /// TOML parse error.
    Parse(toml::de::Error),
    /// Option number outside the usable protobuf field range.
    InvalidOptionNumber(u32),
    /// Tag key that Go's struct tag syntax cannot express.
    InvalidTagKey(String),
    /// A list setting that must not be empty.
    EmptyList(&'static str),
    EmptyMarker,
    /// Invalid glob pattern.
    InvalidGlob(String, String),
    /// Invalid output format string.
    InvalidFormat(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, err) => {
                write!(f, "failed to read {}: {}", path.display(), err)
            }
            ConfigError::Parse(err) => write!(f, "TOML parse error: {}", err),
            ConfigError::InvalidOptionNumber(n) => {
                write!(
                    f,
                    "invalid option_number {} (must be 1..=536870911, outside 19000..=19999)",
                    n
                )
            }
            ConfigError::InvalidTagKey(key) => {
                write!(f, "invalid tag_key '{}'", key)
            }
            ConfigError::EmptyList(name) => write!(f, "{} must not be empty", name),
            ConfigError::EmptyMarker => write!(f, "comment_marker must not be blank"),
            ConfigError::InvalidGlob(pattern, err) => {
                write!(f, "invalid glob pattern '{}': {}", pattern, err)
            }
            ConfigError::InvalidFormat(fmt) => {
                write!(
                    f,
                    "invalid output format '{}' (valid: text, json, github)",
                    fmt
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// =========================================================================
// Tests
// =========================================================================
