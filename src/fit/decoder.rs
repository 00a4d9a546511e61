//! Reader-based stream decoder.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use chrono::DateTime;
use either::Either::{Left, Right};
use log::debug;

use super::{
    FitError, check,
    header::{self, FieldLayout},
    message::{FieldKind, FitField, FitMessage, MessageKind, Value},
    profile::{self, base_type},
};

/// Lazy, single-pass decoder over a reader of a FIT document.
///
/// The iterator yields messages in document order. After the final data
/// record the trailing integrity check is verified, surfacing a mismatch
/// as a last error item. The reader is released when the decoder is
/// dropped, whether decoding completed or failed.
pub struct FitDecoder<R: Read> {
    reader: R,
    offset: usize,
    crc: u16,
    end: usize,
    definitions: [Option<Definition>; 16],
    finished: bool,
}

#[derive(Debug)]
struct Definition {
    global: u16,
    little_endian: bool,
    fields: Vec<FieldLayout>,
}

impl<R: Read> FitDecoder<R> {
    /// Begin decoding, validating the document header.
    pub fn new(mut reader: R) -> Result<Self, FitError> {
        let mut offset = 0;
        let mut crc = 0;

        let info = header::parse_file_header(take(&mut reader, &mut offset, &mut crc)?)?;
        if info.extended {
            let _: [u8; 2] = take(&mut reader, &mut offset, &mut crc)?;
        }

        Ok(Self {
            reader,
            end: offset + info.data_size as usize,
            offset,
            crc,
            definitions: Default::default(),
            finished: false,
        })
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], FitError> {
        take(&mut self.reader, &mut self.offset, &mut self.crc)
    }

    fn take_vec(&mut self, n: usize) -> Result<Vec<u8>, FitError> {
        let mut buf = vec![0; n];
        self.reader.read_exact(&mut buf)?;
        self.offset += n;
        self.crc = check::update(self.crc, &buf);
        Ok(buf)
    }

    fn next_message(&mut self) -> Result<Option<FitMessage>, FitError> {
        while self.offset < self.end {
            let offset = self.offset;
            let [r] = self.take()?;

            match header::parse_record_header(r, offset)? {
                Left(local) => self.read_definition(local)?,
                Right(local) => return self.read_data(local).map(Some),
            }
        }

        // End of the record section: verify the trailing check value,
        // which is itself excluded from the accumulation.
        let calculated = self.crc;
        let mut found = [0; 2];
        self.reader.read_exact(&mut found)?;
        let found = u16::from_le_bytes(found);

        if found != calculated {
            return Err(FitError::CyclicRedundancyCheck {
                found,
                calculated,
            });
        }

        Ok(None)
    }

    fn read_definition(&mut self, local: u8) -> Result<(), FitError> {
        let offset = self.offset;
        let head = header::parse_definition_head(self.take()?);

        if head.global == u16::MAX {
            return Err(FitError::InvalidGlobalMessage { offset });
        }

        let mut fields = Vec::with_capacity(head.field_count as usize);
        for _ in 0..head.field_count {
            let offset = self.offset;
            let layout = header::parse_field_layout(self.take()?);
            if profile::base_type_width(layout.base).is_none() {
                return Err(FitError::UnknownBaseType {
                    base: layout.base,
                    offset,
                });
            }
            fields.push(layout);
        }

        self.definitions[local as usize & 0xF] = Some(Definition {
            global: head.global,
            little_endian: head.little_endian,
            fields,
        });

        Ok(())
    }

    fn read_data(&mut self, local: u8) -> Result<FitMessage, FitError> {
        let offset = self.offset;
        let definition = self.definitions[local as usize & 0xF]
            .take()
            .ok_or(FitError::UndefinedMessage { local, offset })?;

        let mut fields = Vec::new();
        for layout in &definition.fields {
            let raw = self.take_vec(layout.size as usize)?;

            if let Some(def) = profile::field_by_number(definition.global, layout.number) {
                // The document's declared base governs the byte layout;
                // the profile governs the semantic class.
                if let Some(value) =
                    decode_value(def.kind, layout.base, &raw, definition.little_endian)
                {
                    fields.push(FitField {
                        name: def.name,
                        value,
                    });
                }
            }
        }

        let message = FitMessage::new(MessageKind::from_global(definition.global), fields);
        self.definitions[local as usize & 0xF] = Some(definition);

        Ok(message)
    }
}

impl<R: Read> Iterator for FitDecoder<R> {
    type Item = Result<FitMessage, FitError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_message() {
            Ok(Some(message)) => Some(Ok(message)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(error) => {
                self.finished = true;
                Some(Err(error))
            }
        }
    }
}

/// Decode every message from a reader of a FIT document.
///
/// Either the full message sequence is returned, or the first error;
/// partial results are never returned.
pub fn decode_reader(reader: impl Read) -> Result<Vec<FitMessage>, FitError> {
    let messages = FitDecoder::new(reader)?.collect::<Result<Vec<_>, _>>()?;
    debug!("Decoded {} messages.", messages.len());
    Ok(messages)
}

/// Decode every message from a FIT file on disk.
///
/// The file handle is released when decoding completes or fails.
pub fn decode_file(path: impl AsRef<Path>) -> Result<Vec<FitMessage>, FitError> {
    let file = File::open(path)?;
    decode_reader(BufReader::new(file))
}

/// Take an exact number of bytes from a reader, advancing the offset and
/// accumulating the CRC value.
fn take<const N: usize>(
    r: &mut impl Read,
    offset: &mut usize,
    crc: &mut u16,
) -> Result<[u8; N], FitError> {
    let mut buf = [0; N];
    r.read_exact(&mut buf)?;

    *offset += N;
    *crc = check::update(*crc, &buf);

    Ok(buf)
}

/// Convert one field's bytes to a value, unless the field holds its
/// 'invalid' marker. Fields sized for multiple elements keep the first.
fn decode_value(kind: FieldKind, base: u8, raw: &[u8], little_endian: bool) -> Option<Value> {
    let width = profile::base_type_width(base)? as usize;
    if raw.len() < width {
        return None;
    }

    if base == base_type::STRING {
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        if end == 0 {
            return None;
        }
        return Some(Value::Text(String::from_utf8_lossy(&raw[..end]).into_owned()));
    }

    let unsigned = read_unsigned(&raw[..width], little_endian);

    match base {
        base_type::FLOAT32 => {
            if unsigned == u64::from(u32::MAX) {
                return None;
            }
            Some(Value::Float(f64::from(f32::from_bits(unsigned as u32))))
        }
        base_type::FLOAT64 => {
            if unsigned == u64::MAX {
                return None;
            }
            Some(Value::Float(f64::from_bits(unsigned)))
        }
        _ => {
            if unsigned == invalid_marker(base, width) {
                return None;
            }

            match kind {
                FieldKind::Timestamp => {
                    let seconds = unsigned as i64 + profile::FIT_EPOCH_OFFSET;
                    DateTime::from_timestamp(seconds, 0).map(Value::Timestamp)
                }
                FieldKind::Enumerated => Some(Value::Enum(unsigned as u8)),
                _ if is_signed(base) => Some(Value::Int(sign_extend(unsigned, width))),
                _ => Some(Value::Uint(unsigned)),
            }
        }
    }
}

fn read_unsigned(bytes: &[u8], little_endian: bool) -> u64 {
    if little_endian {
        bytes
            .iter()
            .rev()
            .fold(0, |acc, &b| (acc << 8) | u64::from(b))
    } else {
        bytes.iter().fold(0, |acc, &b| (acc << 8) | u64::from(b))
    }
}

fn is_signed(base: u8) -> bool {
    matches!(
        base,
        base_type::SINT8 | base_type::SINT16 | base_type::SINT32 | base_type::SINT64
    )
}

fn sign_extend(unsigned: u64, width: usize) -> i64 {
    let shift = 64 - width * 8;
    ((unsigned << shift) as i64) >> shift
}

/// The marker value a field holds when its content is not valid.
fn invalid_marker(base: u8, width: usize) -> u64 {
    let ones = if width == 8 {
        u64::MAX
    } else {
        (1 << (width * 8)) - 1
    };

    match base {
        base_type::UINT8Z | base_type::UINT16Z | base_type::UINT32Z | base_type::UINT64Z => 0,
        _ if is_signed(base) => ones >> 1,
        _ => ones,
    }
}
