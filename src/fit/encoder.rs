//! Building well-formed FIT documents from decoded messages.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::debug;

use super::{
    check,
    message::{FieldKind, FitField, FitMessage, MessageKind, Value},
    profile::{self, base_type},
};

const PROTOCOL_VERSION: u8 = 0x10;
const PROFILE_VERSION: u16 = 2195;

/// `file_id` constants for synthesized identities.
const FILE_TYPE_ACTIVITY: u8 = 4;
const MANUFACTURER_DEVELOPMENT: u64 = 255;
const SERIAL_NUMBER: u64 = 0x12345678;

/// Incrementally encodes messages into a self-contained FIT document.
///
/// Definition records are derived from each message's concrete field set
/// and always precede the first data record using them. Local message
/// numbers are assigned round-robin across the sixteen slots, re-emitting
/// a definition if its slot has since been reused.
pub struct FitEncoder {
    records: Vec<u8>,
    locals: HashMap<DefinitionKey, u8>,
    slots: [Option<DefinitionKey>; 16],
    next_slot: u8,
}

/// A definition record's identity: the global message number and the
/// (number, size, base type) triple of every field, in order.
#[derive(Clone, PartialEq, Eq, Hash)]
struct DefinitionKey {
    global: u16,
    fields: Vec<(u8, u8, u8)>,
}

impl FitEncoder {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            locals: HashMap::new(),
            slots: Default::default(),
            next_slot: 0,
        }
    }

    /// Append a message, preceded by a definition record if its layout has
    /// not been defined (or its slot has been reused) since.
    ///
    /// Fields the profile cannot map back to a number are dropped; a
    /// message retaining no fields at all is skipped entirely.
    pub fn add(&mut self, message: &FitMessage) {
        let global = message.kind.global();

        let mut layout = Vec::with_capacity(message.fields.len());
        for field in &message.fields {
            let Some(def) = profile::field_by_name(global, field.name) else {
                debug!("Dropping unmapped field {} from message {global}.", field.name);
                continue;
            };
            let Some(bytes) = encode_value(def.base, def.kind, &field.value) else {
                debug!("Dropping unencodable field {}.", field.name);
                continue;
            };
            layout.push((def.number, def.base, bytes));
        }

        if layout.is_empty() {
            debug!("Skipping message {global} with no encodable fields.");
            return;
        }

        let key = DefinitionKey {
            global,
            fields: layout
                .iter()
                .map(|(number, base, bytes)| (*number, bytes.len() as u8, *base))
                .collect(),
        };

        let local = self.local_for(key);

        self.records.push(local);
        for (_, _, bytes) in &layout {
            self.records.extend_from_slice(bytes);
        }
    }

    /// The local message number for a definition, emitting the definition
    /// record on first use.
    fn local_for(&mut self, key: DefinitionKey) -> u8 {
        if let Some(&local) = self.locals.get(&key) {
            return local;
        }

        let local = self.next_slot;
        self.next_slot = (self.next_slot + 1) % 16;

        if let Some(evicted) = self.slots[local as usize].replace(key.clone()) {
            self.locals.remove(&evicted);
        }
        self.locals.insert(key.clone(), local);

        self.records.push(0x40 | local);
        self.records.push(0); // Reserved.
        self.records.push(0); // Architecture: little-endian.
        self.records.extend_from_slice(&key.global.to_le_bytes());
        self.records.push(key.fields.len() as u8);
        for (number, size, base) in &key.fields {
            self.records.extend([*number, *size, *base]);
        }

        local
    }

    /// Assemble the document: header, records, and trailing check value.
    pub fn finish(self) -> Vec<u8> {
        let mut document = Vec::with_capacity(self.records.len() + 16);

        document.push(14); // Header length.
        document.push(PROTOCOL_VERSION);
        document.extend_from_slice(&PROFILE_VERSION.to_le_bytes());
        document.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        document.extend_from_slice(b".FIT");

        let header_crc = check::update(0, &document);
        document.extend_from_slice(&header_crc.to_le_bytes());

        document.extend_from_slice(&self.records);

        let crc = check::update(0, &document);
        document.extend_from_slice(&crc.to_le_bytes());

        document
    }
}

impl Default for FitEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Synthesize the file identity message carried at the head of every
/// output file: an activity file from a development-tool manufacturer
/// with a stable serial number.
pub fn file_id(time_created: DateTime<Utc>) -> FitMessage {
    FitMessage::new(
        MessageKind::FileId,
        vec![
            FitField {
                name: "type",
                value: Value::Enum(FILE_TYPE_ACTIVITY),
            },
            FitField {
                name: "manufacturer",
                value: Value::Uint(MANUFACTURER_DEVELOPMENT),
            },
            FitField {
                name: "product",
                value: Value::Uint(0),
            },
            FitField {
                name: "serial_number",
                value: Value::Uint(SERIAL_NUMBER),
            },
            FitField {
                name: "time_created",
                value: Value::Timestamp(time_created),
            },
        ],
    )
}

/// Encode a message subset into an independently playable document,
/// prefixed with a synthesized file identity.
pub fn encode_segment<'a>(
    messages: impl IntoIterator<Item = &'a FitMessage>,
    time_created: DateTime<Utc>,
) -> Vec<u8> {
    let mut encoder = FitEncoder::new();
    encoder.add(&file_id(time_created));
    for message in messages {
        encoder.add(message);
    }
    encoder.finish()
}

/// Encode one value against its profile entry, little-endian.
fn encode_value(base: u8, kind: FieldKind, value: &Value) -> Option<Vec<u8>> {
    let width = profile::base_type_width(base)? as usize;

    match value {
        Value::Timestamp(t) => {
            if kind != FieldKind::Timestamp || base != base_type::UINT32 {
                return None;
            }
            let seconds = (t.timestamp() - profile::FIT_EPOCH_OFFSET).clamp(0, u32::MAX as i64);
            Some((seconds as u32).to_le_bytes().to_vec())
        }
        Value::Enum(v) => (width == 1).then(|| vec![*v]),
        Value::Uint(v) => Some(unsigned_bytes(*v, width)),
        Value::Int(v) => Some(signed_bytes(*v, width)),
        Value::Float(v) => match base {
            base_type::FLOAT32 => Some((*v as f32).to_le_bytes().to_vec()),
            base_type::FLOAT64 => Some(v.to_le_bytes().to_vec()),
            _ if is_signed(base) => Some(signed_bytes(v.round() as i64, width)),
            _ => Some(unsigned_bytes(v.round().max(0.0) as u64, width)),
        },
        Value::Text(s) => {
            if base != base_type::STRING || s.len() > u8::MAX as usize - 1 {
                return None;
            }
            let mut bytes = s.as_bytes().to_vec();
            bytes.push(0);
            Some(bytes)
        }
    }
}

fn unsigned_bytes(v: u64, width: usize) -> Vec<u8> {
    let max = if width == 8 {
        u64::MAX
    } else {
        (1 << (width * 8)) - 1
    };
    v.min(max).to_le_bytes()[..width].to_vec()
}

fn signed_bytes(v: i64, width: usize) -> Vec<u8> {
    let (min, max) = if width == 8 {
        (i64::MIN, i64::MAX)
    } else {
        let bits = (width * 8) as u32;
        (-(1_i64 << (bits - 1)), (1_i64 << (bits - 1)) - 1)
    };
    // After clamping into range, two's complement truncation is exact.
    v.clamp(min, max).to_le_bytes()[..width].to_vec()
}

fn is_signed(base: u8) -> bool {
    matches!(
        base,
        base_type::SINT8 | base_type::SINT16 | base_type::SINT32 | base_type::SINT64
    )
}
