//! Detection of the custom immutability option inside `FieldOptions` bytes.
//!
//! Two decoders sit behind [`OptionDecoder`]:
//! - [`FixedPatternDecoder`] matches the exact 4-byte prefix emitted by
//!   `protoc` for `[(immutable) = true]` and nothing else. Options serialized
//!   before the extension, a wider varint, or an explicit `false` followed by
//!   other options all go undetected. Kept as the default for compatibility
//!   with existing descriptor sets.
//! - [`ExtensionScanDecoder`] walks the option block field by field and only
//!   interprets the value when the field number matches, independent of
//!   ordering and encoding width.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Field number of the `immutable` extension on `google.protobuf.FieldOptions`.
pub const IMMUTABLE_OPTION_NUMBER: u32 = 59527;

const WIRE_VARINT: u64 = 0;
const WIRE_FIXED64: u64 = 1;
const WIRE_LENGTH_DELIMITED: u64 = 2;
const WIRE_START_GROUP: u64 = 3;
const WIRE_END_GROUP: u64 = 4;
const WIRE_FIXED32: u64 = 5;

/// Decides whether a serialized `FieldOptions` block carries the option.
pub trait OptionDecoder {
    fn is_immutable(&self, options: &[u8]) -> bool;
}

/// Which decoder the loader should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderKind {
    /// Exact byte-prefix match (compatible default).
    #[default]
    Fixed,
    /// Generic key-by-key scan of the option block.
    Scan,
}

impl DecoderKind {
    pub fn build(self, option_number: u32) -> Box<dyn OptionDecoder> {
        match self {
            DecoderKind::Fixed => Box::new(FixedPatternDecoder::new(option_number)),
            DecoderKind::Scan => Box::new(ExtensionScanDecoder::new(option_number)),
        }
    }
}

/// Prefix match on `key(option_number, varint) ++ 0x01`.
#[derive(Debug, Clone)]
pub struct FixedPatternDecoder {
    pattern: Vec<u8>,
}

impl FixedPatternDecoder {
    pub fn new(option_number: u32) -> Self {
        let mut pattern = Vec::with_capacity(6);
        let key = (u64::from(option_number) << 3) | WIRE_VARINT;
        prost::encoding::encode_varint(key, &mut pattern);
        pattern.push(1);
        Self { pattern }
    }

    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }
}

impl Default for FixedPatternDecoder {
    fn default() -> Self {
        Self::new(IMMUTABLE_OPTION_NUMBER)
    }
}

impl OptionDecoder for FixedPatternDecoder {
    fn is_immutable(&self, options: &[u8]) -> bool {
        options.starts_with(&self.pattern)
    }
}

/// Generic decode of the option block.
#[derive(Debug, Clone)]
pub struct ExtensionScanDecoder {
    option_number: u32,
}

impl ExtensionScanDecoder {
    pub fn new(option_number: u32) -> Self {
        Self { option_number }
    }

    /// Value of the last varint occurrence of the option, if any.
    ///
    /// Returns `None` on malformed input; a truncated block never counts as
    /// carrying the option.
    fn scan(&self, mut buf: &[u8]) -> Option<Option<u64>> {
        let mut found = None;

        while !buf.is_empty() {
            let key = prost::encoding::decode_varint(&mut buf).ok()?;
            let wire_type = key & 0x7;
            let number = key >> 3;

            match wire_type {
                WIRE_VARINT => {
                    let value = prost::encoding::decode_varint(&mut buf).ok()?;
                    if number == u64::from(self.option_number) {
                        found = Some(value);
                    }
                }
                WIRE_FIXED64 => buf = buf.get(8..)?,
                WIRE_FIXED32 => buf = buf.get(4..)?,
                WIRE_LENGTH_DELIMITED => {
                    let len = usize::try_from(prost::encoding::decode_varint(&mut buf).ok()?).ok()?;
                    buf = buf.get(len..)?;
                }
                // Groups carry no payload of their own; their members are
                // visited as ordinary keys.
                WIRE_START_GROUP | WIRE_END_GROUP => {}
                _ => return None,
            }
        }

        Some(found)
    }
}

impl Default for ExtensionScanDecoder {
    fn default() -> Self {
        Self::new(IMMUTABLE_OPTION_NUMBER)
    }
}

impl OptionDecoder for ExtensionScanDecoder {
    fn is_immutable(&self, options: &[u8]) -> bool {
        matches!(self.scan(options), Some(Some(value)) if value != 0)
    }
}
