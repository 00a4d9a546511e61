//! Decoded message and field representations.

use chrono::{DateTime, Utc};

use super::profile;

/// The semantic class of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Seconds since the FIT epoch, surfaced as an absolute time.
    Timestamp,
    /// A plain quantity (integer or floating point).
    Numeric,
    /// A nul-terminated UTF-8 string.
    Text,
    /// A value from a protocol enumeration, kept as its raw code.
    Enumerated,
}

/// A decoded field value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Timestamp(DateTime<Utc>),
    Uint(u64),
    Int(i64),
    Float(f64),
    Text(String),
    Enum(u8),
}

impl Value {
    pub fn kind(&self) -> FieldKind {
        match self {
            Value::Timestamp(_) => FieldKind::Timestamp,
            Value::Uint(_) | Value::Int(_) | Value::Float(_) => FieldKind::Numeric,
            Value::Text(_) => FieldKind::Text,
            Value::Enum(_) => FieldKind::Enumerated,
        }
    }

    /// The value as a plain number, if it is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Uint(v) => Some(*v as f64),
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

/// One named field of a decoded message. Immutable once decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct FitField {
    pub name: &'static str,
    pub value: Value,
}

/// The message type tag carried by a definition record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    FileId,
    Session,
    Record,
    Event,
    /// Any other global message number. Only the timestamp field is
    /// resolved for these, so they still participate in segmentation.
    Other(u16),
}

impl MessageKind {
    pub fn from_global(global: u16) -> Self {
        match global {
            profile::FILE_ID => MessageKind::FileId,
            profile::SESSION => MessageKind::Session,
            profile::RECORD => MessageKind::Record,
            profile::EVENT => MessageKind::Event,
            global => MessageKind::Other(global),
        }
    }

    pub fn global(self) -> u16 {
        match self {
            MessageKind::FileId => profile::FILE_ID,
            MessageKind::Session => profile::SESSION,
            MessageKind::Record => profile::RECORD,
            MessageKind::Event => profile::EVENT,
            MessageKind::Other(global) => global,
        }
    }
}

/// A decoded message: a type tag and an ordered list of fields.
#[derive(Clone, Debug, PartialEq)]
pub struct FitMessage {
    pub kind: MessageKind,
    pub fields: Vec<FitField>,
    /// The value of the `timestamp` field, if the message carries one.
    pub timestamp: Option<DateTime<Utc>>,
}

impl FitMessage {
    /// Build a message, deriving its timestamp from the `timestamp` field.
    pub fn new(kind: MessageKind, fields: Vec<FitField>) -> Self {
        let timestamp = fields
            .iter()
            .find(|f| f.name == "timestamp")
            .and_then(|f| f.value.as_timestamp());
        Self {
            kind,
            fields,
            timestamp,
        }
    }

    /// Retrieve a field's value by name, if present.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }
}
