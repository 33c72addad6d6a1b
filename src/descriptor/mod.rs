//! Descriptor loader.
//!
//! Reads a serialized `FileDescriptorSet` and extracts, per message type, the
//! names of fields whose `FieldOptions` carry the immutability extension.
//! Field names are kept in descriptor case (`team_lead`); reconciliation with
//! Go identifiers happens in the registry.
//!
//! A missing or malformed document is never fatal: [`locate`] logs the reason
//! and returns `None`, and the checker continues with local markers only.

mod options;
pub mod proto;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use prost::Message;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use options::{
    DecoderKind, ExtensionScanDecoder, FixedPatternDecoder, OptionDecoder,
    IMMUTABLE_OPTION_NUMBER,
};

use proto::{DescriptorProto, FileDescriptorSet};

/// Conventional location of the descriptor set, relative to a project root.
pub const DEFAULT_DESCRIPTOR_PATH: &str = "pb/descriptor/all.protos.pb";

/// Errors from reading or decoding a descriptor document.
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("failed to read descriptor {path}: {error}")]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("failed to decode descriptor {path}: {error}")]
    Decode {
        path: PathBuf,
        error: prost::DecodeError,
    },
}

/// Message name to immutable field names, in descriptor case.
///
/// Only messages with at least one immutable field are present. Nested
/// messages use the generated Go symbol name (`Outer_Inner`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DescriptorIndex {
    messages: BTreeMap<String, Vec<String>>,
}

impl DescriptorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `field` as immutable on `message`. Duplicate names are ignored.
    pub fn insert(&mut self, message: impl Into<String>, field: impl Into<String>) {
        let field = field.into();
        let fields = self.messages.entry(message.into()).or_default();
        if !fields.contains(&field) {
            fields.push(field);
        }
    }

    /// Immutable field names for a message, matched exactly first and then
    /// case-insensitively.
    pub fn fields_for(&self, message: &str) -> Option<&[String]> {
        if let Some(fields) = self.messages.get(message) {
            return Some(fields);
        }
        self.messages
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(message))
            .map(|(_, fields)| fields.as_slice())
    }

    pub fn contains_message(&self, message: &str) -> bool {
        self.fields_for(message).is_some()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn collect_message(&mut self, prefix: Option<&str>, message: &DescriptorProto, decoder: &dyn OptionDecoder) {
        let name = match prefix {
            Some(outer) => format!("{}_{}", outer, message.name()),
            None => message.name().to_string(),
        };

        for field in &message.field {
            let immutable = field
                .options
                .as_deref()
                .is_some_and(|bytes| decoder.is_immutable(bytes));
            if immutable {
                self.insert(name.clone(), field.name());
            }
        }

        for nested in &message.nested_type {
            self.collect_message(Some(&name), nested, decoder);
        }
    }
}

/// Decode a serialized `FileDescriptorSet` into an index.
pub fn decode_descriptor_set(
    bytes: &[u8],
    decoder: &dyn OptionDecoder,
) -> std::result::Result<DescriptorIndex, prost::DecodeError> {
    let set = FileDescriptorSet::decode(bytes)?;
    let mut index = DescriptorIndex::new();
    for file in &set.file {
        for message in &file.message_type {
            index.collect_message(None, message, decoder);
        }
    }
    Ok(index)
}

/// Read and decode the descriptor set at `path`.
pub fn load_descriptor_set(
    path: &Path,
    decoder: &dyn OptionDecoder,
) -> std::result::Result<DescriptorIndex, DescriptorError> {
    let bytes = std::fs::read(path).map_err(|error| DescriptorError::Io {
        path: path.to_path_buf(),
        error,
    })?;
    decode_descriptor_set(&bytes, decoder).map_err(|error| DescriptorError::Decode {
        path: path.to_path_buf(),
        error,
    })
}

/// Ordered candidate locations for a package in `pkg_dir`.
///
/// Explicit paths come first, then the conventional locations relative to the
/// working directory and to the package directory. Duplicates are dropped.
pub fn candidate_paths(explicit: &[PathBuf], pkg_dir: &Path) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = explicit.to_vec();
    candidates.push(PathBuf::from(DEFAULT_DESCRIPTOR_PATH));
    candidates.push(Path::new(".").join(DEFAULT_DESCRIPTOR_PATH));
    candidates.push(pkg_dir.join("../..").join(DEFAULT_DESCRIPTOR_PATH));
    candidates.push(pkg_dir.join("..").join(DEFAULT_DESCRIPTOR_PATH));
    candidates.push(pkg_dir.join(DEFAULT_DESCRIPTOR_PATH));

    let mut seen = Vec::with_capacity(candidates.len());
    candidates.retain(|path| {
        if seen.contains(path) {
            false
        } else {
            seen.push(path.clone());
            true
        }
    });
    candidates
}

/// Try each candidate in order; the first one that exists and decodes wins.
pub fn locate(candidates: &[PathBuf], decoder: &dyn OptionDecoder) -> Option<(PathBuf, DescriptorIndex)> {
    for path in candidates {
        if !path.is_file() {
            debug!("descriptor candidate {} not found", path.display());
            continue;
        }
        match load_descriptor_set(path, decoder) {
            Ok(index) => {
                info!(
                    "loaded descriptor {} ({} messages with immutable fields)",
                    path.display(),
                    index.len()
                );
                return Some((path.clone(), index));
            }
            Err(e) => warn!("{}", e),
        }
    }
    debug!("no descriptor found; using struct tags and comments only");
    None
}
