//! Channel payload decoding and interval timestamp reconstruction.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, ErrorKind, Read, Seek, SeekFrom},
    path::Path,
};

use chrono::{DateTime, TimeDelta, Utc};
use log::debug;

use super::{
    KdfError,
    header::{ChannelDescriptor, DataEncoding, KdfHeader},
};

/// Size of the fixed preamble: identifier, reserved bytes, header length.
const PREAMBLE_SIZE: u64 = 14;

const IDENTIFIER: &[u8; 7] = b"KDFJSON";

/// One decoded channel: its declared type and payload.
#[derive(Clone, Debug, PartialEq)]
pub struct KdfChannel {
    pub kind: String,
    pub data: ChannelData,
}

impl KdfChannel {
    /// The channel's fixed-width samples; empty for marker channels.
    pub fn samples(&self) -> &[KdfSample] {
        match &self.data {
            ChannelData::Samples(samples) => samples,
            ChannelData::Markers(_) => &[],
        }
    }
}

/// A channel payload: decoded fixed-width samples, or the raw rows of a
/// `list`-encoded marker channel.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelData {
    Samples(Vec<KdfSample>),
    Markers(Vec<serde_json::Value>),
}

/// One decoded sample: named numeric fields, and for interval channels a
/// reconstructed absolute timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct KdfSample {
    pub timestamp: Option<DateTime<Utc>>,
    pub fields: Vec<(String, f64)>,
}

impl KdfSample {
    /// The sample's leading field value.
    pub fn value(&self) -> Option<f64> {
        self.fields.first().map(|(_, v)| *v)
    }
}

/// Decode every channel from a KDF file on disk.
///
/// The file handle is released when decoding completes or fails.
pub fn decode_file(path: impl AsRef<Path>) -> Result<BTreeMap<String, KdfChannel>, KdfError> {
    let file = File::open(path)?;
    decode_reader(&mut BufReader::new(file))
}

/// Decode every channel from a reader of a KDF document, keyed by label.
///
/// Either the full channel mapping is returned, or the first error;
/// partial results are never returned.
pub fn decode_reader<R: Read + Seek>(
    reader: &mut R,
) -> Result<BTreeMap<String, KdfChannel>, KdfError> {
    let mut identifier = [0; 7];
    reader.read_exact(&mut identifier)?;
    if &identifier != IDENTIFIER {
        return Err(KdfError::NotKdfJson);
    }

    let mut reserved = [0; 3];
    reader.read_exact(&mut reserved)?;

    let mut length = [0; 4];
    reader.read_exact(&mut length)?;
    let header_size = u32::from_le_bytes(length) as u64;

    let mut body = vec![0; header_size as usize];
    reader.read_exact(&mut body)?;
    let header: KdfHeader = serde_json::from_slice(&body)?;

    let start = header.reference_time()?;
    let header_end = PREAMBLE_SIZE + header_size;

    let mut channels = BTreeMap::new();
    for descriptor in &header.channels {
        let channel = decode_channel(reader, descriptor, header_end, start)?;
        channels.insert(descriptor.label.clone(), channel);
    }

    debug!("Decoded {} channels.", channels.len());
    Ok(channels)
}

fn decode_channel<R: Read + Seek>(
    reader: &mut R,
    descriptor: &ChannelDescriptor,
    header_end: u64,
    start: DateTime<Utc>,
) -> Result<KdfChannel, KdfError> {
    reader.seek(SeekFrom::Start(header_end + descriptor.data_url))?;

    let mut window = vec![0; descriptor.data_size as usize];
    reader.read_exact(&mut window).map_err(|error| {
        if error.kind() == ErrorKind::UnexpectedEof {
            KdfError::ShortChannelData {
                label: descriptor.label.clone(),
            }
        } else {
            KdfError::Io(error)
        }
    })?;

    let data = match &descriptor.data_enc {
        DataEncoding::Keyword(keyword) if keyword == "list" => {
            let markers = serde_json::from_slice(&window).map_err(|source| KdfError::Markers {
                label: descriptor.label.clone(),
                source,
            })?;
            ChannelData::Markers(markers)
        }
        DataEncoding::Keyword(keyword) => {
            return Err(KdfError::UnsupportedEncoding {
                label: descriptor.label.clone(),
                kind: keyword.clone(),
            });
        }
        DataEncoding::Schema(schema) => {
            ChannelData::Samples(decode_struct_channel(descriptor, schema, &window, start)?)
        }
    };

    Ok(KdfChannel {
        kind: descriptor.kind.clone(),
        data,
    })
}

/// Decode a fixed-width struct channel, reconstructing timestamps for
/// interval types by cumulative sum over the reference start time.
fn decode_struct_channel(
    descriptor: &ChannelDescriptor,
    schema: &[(String, String)],
    window: &[u8],
    start: DateTime<Utc>,
) -> Result<Vec<KdfSample>, KdfError> {
    let label = &descriptor.label;

    let mut layout = Vec::with_capacity(schema.len());
    for (name, code) in schema {
        let primitive = Primitive::from_code(code).ok_or_else(|| KdfError::UnknownTypeCode {
            label: label.clone(),
            code: code.clone(),
        })?;
        layout.push((name.as_str(), primitive));
    }

    let stride: usize = layout.iter().map(|(_, p)| p.width()).sum();
    let count = descriptor.total_values.ok_or_else(|| KdfError::MissingCount {
        label: label.clone(),
    })? as usize;

    match stride.checked_mul(count) {
        Some(needed) if needed <= window.len() => {}
        _ => {
            return Err(KdfError::ShortChannelData {
                label: label.clone(),
            });
        }
    }

    let reconstruct = matches!(descriptor.kind.as_str(), "RRI" | "PPI");
    let mut current = start;

    let mut samples = Vec::with_capacity(count);
    for index in 0..count {
        let mut offset = index * stride;
        let mut fields = Vec::with_capacity(layout.len());
        for (name, primitive) in &layout {
            fields.push(((*name).to_owned(), primitive.decode(&window[offset..])));
            offset += primitive.width();
        }

        let timestamp = if reconstruct {
            let interval = fields[0].1;
            if interval < 0.0 {
                return Err(KdfError::NegativeInterval {
                    label: label.clone(),
                    index,
                });
            }
            current = current + TimeDelta::microseconds((interval * 1_000.0).round() as i64);
            Some(current)
        } else {
            None
        };

        samples.push(KdfSample {
            timestamp,
            fields,
        });
    }

    Ok(samples)
}

/// A primitive type code from a struct schema, little-endian.
#[derive(Clone, Copy, Debug)]
enum Primitive {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl Primitive {
    fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "B" => Self::U8,
            "b" => Self::I8,
            "H" => Self::U16,
            "h" => Self::I16,
            "I" | "L" => Self::U32,
            "i" | "l" => Self::I32,
            "Q" => Self::U64,
            "q" => Self::I64,
            "f" => Self::F32,
            "d" => Self::F64,
            _ => return None,
        })
    }

    fn width(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    /// Decode one value from the head of a slice. The caller guarantees
    /// at least `width` bytes remain.
    fn decode(self, bytes: &[u8]) -> f64 {
        match self {
            Self::U8 => f64::from(bytes[0]),
            Self::I8 => f64::from(bytes[0] as i8),
            Self::U16 => f64::from(u16::from_le_bytes(bytes[..2].try_into().unwrap())),
            Self::I16 => f64::from(i16::from_le_bytes(bytes[..2].try_into().unwrap())),
            Self::U32 => f64::from(u32::from_le_bytes(bytes[..4].try_into().unwrap())),
            Self::I32 => f64::from(i32::from_le_bytes(bytes[..4].try_into().unwrap())),
            Self::U64 => u64::from_le_bytes(bytes[..8].try_into().unwrap()) as f64,
            Self::I64 => i64::from_le_bytes(bytes[..8].try_into().unwrap()) as f64,
            Self::F32 => f64::from(f32::from_le_bytes(bytes[..4].try_into().unwrap())),
            Self::F64 => f64::from_le_bytes(bytes[..8].try_into().unwrap()),
        }
    }
}
