//! Decoding and encoding of FIT activity documents.
//!
//! A FIT document is a stream of definition records interleaved with data
//! records. Each data record references the most recent definition for its
//! local message number, which declares the global message number and a
//! per-field byte layout. [`FitDecoder`] walks this stream lazily,
//! resolving globals and field numbers through [`profile`] into named,
//! typed [`FitMessage`] values. [`FitEncoder`] performs the inverse,
//! deriving definition records from each message's concrete field set.

pub mod decoder;
pub mod encoder;
pub mod message;
pub mod profile;

mod check;
mod header;

pub use decoder::{FitDecoder, decode_file, decode_reader};
pub use encoder::{FitEncoder, encode_segment, file_id};
pub use message::{FieldKind, FitField, FitMessage, MessageKind, Value};

use thiserror::Error;

/// Errors occurring while decoding or re-encoding a FIT document.
#[derive(Debug, Error)]
pub enum FitError {
    /// An error from the underlying reader.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Incorrect file type marker.
    #[error("Incorrect file type marker.")]
    NotFitData,
    /// Unknown document header length.
    #[error("Unknown header length ({0}).")]
    UnknownHeaderLength(u8),
    /// Found developer data (not supported).
    #[error("Found developer data at offset {offset}.")]
    DeveloperData { offset: usize },
    /// Found a compressed timestamp header (not supported).
    #[error("Found compressed timestamp header at offset {offset}.")]
    CompressedTimestamp { offset: usize },
    /// A definition record declared the invalid global message number.
    #[error("Definition at offset {offset} declares an invalid global message number.")]
    InvalidGlobalMessage { offset: usize },
    /// A definition record declared a base type outside the protocol set.
    #[error("Definition at offset {offset} declares unknown base type {base:#04x}.")]
    UnknownBaseType { base: u8, offset: usize },
    /// A data record referenced a local message with no prior definition.
    #[error("Data record at offset {offset} references undefined local message {local}.")]
    UndefinedMessage { local: u8, offset: usize },
    /// Calculated and found CRC values do not match.
    #[error("Calculated ({calculated}) and found ({found}) CRC values do not match.")]
    CyclicRedundancyCheck { found: u16, calculated: u16 },
}
