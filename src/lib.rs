//! Merging and splitting of sports-watch activity recordings.
//!
//! Tandem ingests two recordings of the same training session (a FIT
//! activity file produced by a sports watch, and a KDF telemetry file
//! produced by a heart-rate analysis device) and aligns them into a
//! merged, time-ordered record set. It also splits a single multisport
//! FIT recording into one independently playable file per sport segment.
//!
//! The crate is a pure decode/segment/align/encode library: it renders no
//! interface and invokes no external tooling. Each pipeline stage is
//! independently callable:
//!
//! - [`fit::decode_file`] / [`fit::FitDecoder`]: the FIT message stream.
//! - [`kdf::decode_file`]: KDF channels, with interval timestamps
//!   reconstructed by cumulative sum over the reference start time.
//! - [`multisport::split_sessions`]: per-sport segments and transition
//!   events.
//! - [`sync::synchronize`]: nearest-neighbor alignment of interval
//!   samples onto records.
//! - [`fit::encode_segment`]: re-encoding a message subset into a
//!   self-contained file.
//! - [`split::write_split_files`]: the full split pipeline, with a
//!   per-file progress callback.
//!
//! Long-running operations are synchronous; callers wanting background
//! execution run them on their own context and observe progress through
//! the callbacks.

pub mod fit;
pub mod kdf;
pub mod multisport;
pub mod split;
pub mod sync;

pub use fit::{FitDecoder, FitField, FitMessage, Value};
pub use kdf::{KdfChannel, KdfSample};
pub use multisport::{Segment, Session, SessionSplit, Sport};
pub use split::write_split_files;
pub use sync::{SyncedRecord, synchronize};

use thiserror::Error;

/// Any error from a pipeline operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Fit(#[from] fit::FitError),
    #[error(transparent)]
    Kdf(#[from] kdf::KdfError),
    #[error(transparent)]
    Sync(#[from] sync::SyncError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
