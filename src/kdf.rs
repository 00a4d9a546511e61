//! Decoding of KDF heart-rate telemetry documents.
//!
//! A KDF document is a fixed preamble (a seven-byte identifier, three
//! reserved bytes, and a little-endian header length), a UTF-8 JSON
//! header describing channels, and a data region addressed by each
//! channel's declared offset and size relative to the end of the header.
//! Only the JSON-header variant is supported.
//!
//! Channels of type `RRI` or `PPI` store successive inter-beat intervals
//! in milliseconds with no explicit timestamps; [`decoder`] reconstructs
//! each sample's absolute time as the cumulative sum of preceding
//! intervals added to the header's reference start time.

pub mod decoder;
pub mod header;

pub use decoder::{ChannelData, KdfChannel, KdfSample, decode_file, decode_reader};
pub use header::{ChannelDescriptor, DataEncoding, KdfHeader};

use std::collections::BTreeMap;

use thiserror::Error;

/// Errors occurring while decoding a KDF document.
#[derive(Debug, Error)]
pub enum KdfError {
    /// An error from the underlying reader.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The file identifier is not the JSON-header variant.
    #[error("Incorrect file identifier (expected KDFJSON).")]
    NotKdfJson,
    /// The header body is not a well-formed channel description document.
    #[error("Malformed header document: {0}.")]
    Header(#[from] serde_json::Error),
    /// Neither recognized timestamp key is present in the header.
    #[error("No timestamp found in header.")]
    MissingTimestamp,
    /// The header's reference timestamp is not ISO-8601.
    #[error("Unparsable header timestamp ({0}).")]
    InvalidTimestamp(String),
    /// A channel's declared data window extends past the document.
    #[error("Channel {label}: data window extends past the end of the document.")]
    ShortChannelData { label: String },
    /// A channel declared a keyword encoding other than `list`.
    #[error("Channel {label}: unsupported encoding kind ({kind}).")]
    UnsupportedEncoding { label: String, kind: String },
    /// A struct schema used a type code outside the supported set.
    #[error("Channel {label}: unknown type code ({code}).")]
    UnknownTypeCode { label: String, code: String },
    /// A struct-encoded channel did not declare its element count.
    #[error("Channel {label}: struct encoding requires a total value count.")]
    MissingCount { label: String },
    /// A list-encoded channel's window is not a JSON array.
    #[error("Channel {label}: malformed marker list: {source}.")]
    Markers {
        label: String,
        source: serde_json::Error,
    },
    /// An interval channel holds a negative interval, which would break
    /// timestamp reconstruction.
    #[error("Channel {label}: negative interval at sample {index}.")]
    NegativeInterval { label: String, index: usize },
}

/// The first channel carrying inter-beat or inter-pulse intervals.
pub fn interval_channel(channels: &BTreeMap<String, KdfChannel>) -> Option<&KdfChannel> {
    channels
        .values()
        .find(|c| matches!(c.kind.as_str(), "RRI" | "PPI"))
}
