//! The subset of the FIT global profile this crate resolves.
//!
//! Globals and field numbers outside these tables still decode (their
//! bytes are consumed and, for unknown globals, the shared timestamp
//! field is resolved), but only the fields named here survive into
//! [`FitMessage`](super::FitMessage) values or back out through the
//! encoder.

use super::message::FieldKind;

/// Offset from the FIT epoch (1989-12-31T00:00:00Z) to the Unix epoch.
pub const FIT_EPOCH_OFFSET: i64 = 631_065_600;

pub const FILE_ID: u16 = 0;
pub const SESSION: u16 = 18;
pub const RECORD: u16 = 20;
pub const EVENT: u16 = 21;

/// `event_type` code marking a multisport changeover.
pub const EVENT_TYPE_TRANSITION: u8 = 9;

/// FIT base type codes.
pub mod base_type {
    pub const ENUM: u8 = 0x00;
    pub const SINT8: u8 = 0x01;
    pub const UINT8: u8 = 0x02;
    pub const STRING: u8 = 0x07;
    pub const UINT8Z: u8 = 0x0A;
    pub const BYTE: u8 = 0x0D;
    pub const SINT16: u8 = 0x83;
    pub const UINT16: u8 = 0x84;
    pub const SINT32: u8 = 0x85;
    pub const UINT32: u8 = 0x86;
    pub const FLOAT32: u8 = 0x88;
    pub const FLOAT64: u8 = 0x89;
    pub const UINT16Z: u8 = 0x8B;
    pub const UINT32Z: u8 = 0x8C;
    pub const SINT64: u8 = 0x8E;
    pub const UINT64: u8 = 0x8F;
    pub const UINT64Z: u8 = 0x90;
}

/// The storage width of a base type, if the code is part of the protocol.
pub fn base_type_width(base: u8) -> Option<u8> {
    use base_type::*;

    match base {
        ENUM | SINT8 | UINT8 | STRING | UINT8Z | BYTE => Some(1),
        SINT16 | UINT16 | UINT16Z => Some(2),
        SINT32 | UINT32 | UINT32Z | FLOAT32 => Some(4),
        SINT64 | UINT64 | UINT64Z | FLOAT64 => Some(8),
        _ => None,
    }
}

/// One profile entry: a field number bound to a name, base type, and
/// semantic class.
#[derive(Clone, Copy, Debug)]
pub struct FieldDef {
    pub number: u8,
    pub name: &'static str,
    pub base: u8,
    pub kind: FieldKind,
}

const fn def(number: u8, name: &'static str, base: u8, kind: FieldKind) -> FieldDef {
    FieldDef {
        number,
        name,
        base,
        kind,
    }
}

/// The timestamp field shared by most message types.
const TIMESTAMP: FieldDef = def(253, "timestamp", base_type::UINT32, FieldKind::Timestamp);

const FILE_ID_FIELDS: &[FieldDef] = &[
    def(0, "type", base_type::ENUM, FieldKind::Enumerated),
    def(1, "manufacturer", base_type::UINT16, FieldKind::Numeric),
    def(2, "product", base_type::UINT16, FieldKind::Numeric),
    def(3, "serial_number", base_type::UINT32Z, FieldKind::Numeric),
    def(4, "time_created", base_type::UINT32, FieldKind::Timestamp),
];

const SESSION_FIELDS: &[FieldDef] = &[
    TIMESTAMP,
    def(2, "start_time", base_type::UINT32, FieldKind::Timestamp),
    def(5, "sport", base_type::ENUM, FieldKind::Enumerated),
    def(6, "sub_sport", base_type::ENUM, FieldKind::Enumerated),
    def(7, "total_elapsed_time", base_type::UINT32, FieldKind::Numeric),
    def(8, "total_timer_time", base_type::UINT32, FieldKind::Numeric),
    def(9, "total_distance", base_type::UINT32, FieldKind::Numeric),
    def(16, "avg_heart_rate", base_type::UINT8, FieldKind::Numeric),
    def(17, "max_heart_rate", base_type::UINT8, FieldKind::Numeric),
    def(110, "sport_profile_name", base_type::STRING, FieldKind::Text),
];

const RECORD_FIELDS: &[FieldDef] = &[
    TIMESTAMP,
    def(0, "position_lat", base_type::SINT32, FieldKind::Numeric),
    def(1, "position_long", base_type::SINT32, FieldKind::Numeric),
    def(2, "altitude", base_type::UINT16, FieldKind::Numeric),
    def(3, "heart_rate", base_type::UINT8, FieldKind::Numeric),
    def(4, "cadence", base_type::UINT8, FieldKind::Numeric),
    def(5, "distance", base_type::UINT32, FieldKind::Numeric),
    def(6, "speed", base_type::UINT16, FieldKind::Numeric),
    def(7, "power", base_type::UINT16, FieldKind::Numeric),
    def(13, "temperature", base_type::SINT8, FieldKind::Numeric),
];

const EVENT_FIELDS: &[FieldDef] = &[
    TIMESTAMP,
    def(0, "event", base_type::ENUM, FieldKind::Enumerated),
    def(1, "event_type", base_type::ENUM, FieldKind::Enumerated),
    def(2, "data16", base_type::UINT16, FieldKind::Numeric),
    def(3, "data", base_type::UINT32, FieldKind::Numeric),
    def(4, "event_group", base_type::UINT8, FieldKind::Numeric),
];

const TIMESTAMP_ONLY: &[FieldDef] = &[TIMESTAMP];

/// The profile entries for a global message number.
pub fn fields_for(global: u16) -> &'static [FieldDef] {
    match global {
        FILE_ID => FILE_ID_FIELDS,
        SESSION => SESSION_FIELDS,
        RECORD => RECORD_FIELDS,
        EVENT => EVENT_FIELDS,
        _ => TIMESTAMP_ONLY,
    }
}

pub fn field_by_number(global: u16, number: u8) -> Option<&'static FieldDef> {
    fields_for(global).iter().find(|f| f.number == number)
}

pub fn field_by_name(global: u16, name: &str) -> Option<&'static FieldDef> {
    fields_for(global).iter().find(|f| f.name == name)
}
