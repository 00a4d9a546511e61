//! The KDF JSON header document.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

use super::KdfError;

/// Channel descriptors and reference timestamps from a KDF header.
#[derive(Debug, Deserialize)]
pub struct KdfHeader {
    #[serde(default)]
    pub measured_timestamp: Option<String>,
    #[serde(default)]
    pub create_timestamp: Option<String>,
    /// Declared channels; a bare object is normalized to a one-element
    /// list.
    #[serde(default, deserialize_with = "one_or_many")]
    pub channels: Vec<ChannelDescriptor>,
}

impl KdfHeader {
    /// The reference start time for interval reconstruction, preferring
    /// the measured timestamp over the creation timestamp.
    pub fn reference_time(&self) -> Result<DateTime<Utc>, KdfError> {
        let text = self
            .measured_timestamp
            .as_deref()
            .or(self.create_timestamp.as_deref())
            .ok_or(KdfError::MissingTimestamp)?;

        parse_iso8601(text).ok_or_else(|| KdfError::InvalidTimestamp(text.to_owned()))
    }
}

/// One channel's declared label, type, encoding, and data window.
#[derive(Debug, Deserialize)]
pub struct ChannelDescriptor {
    #[serde(default = "unnamed")]
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data_enc: DataEncoding,
    /// Byte offset of the data window, relative to the end of the header.
    pub data_url: u64,
    /// Size of the data window in bytes.
    pub data_size: u64,
    /// Element count for struct-encoded channels.
    #[serde(default)]
    pub total_values: Option<u64>,
}

fn unnamed() -> String {
    "Unnamed_Channel".to_owned()
}

/// The payload encoding declared by a channel.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DataEncoding {
    /// A keyword encoding; only `"list"` (a JSON array of records) is
    /// recognized.
    Keyword(String),
    /// An ordered fixed-width struct schema of (field name, type code)
    /// pairs.
    Schema(Vec<(String, String)>),
}

fn one_or_many<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<ChannelDescriptor>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<ChannelDescriptor>),
        One(ChannelDescriptor),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(channels) => channels,
        OneOrMany::One(channel) => vec![channel],
    })
}

/// Parse an ISO-8601 timestamp, with or without a UTC offset.
fn parse_iso8601(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|t| t.and_utc())
}
