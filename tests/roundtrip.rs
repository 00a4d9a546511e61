use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use tandem::fit::{self, FitError, FitField, FitMessage, MessageKind, Value};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
}

fn record(timestamp: DateTime<Utc>, heart_rate: u64) -> FitMessage {
    FitMessage::new(
        MessageKind::Record,
        vec![
            FitField {
                name: "timestamp",
                value: Value::Timestamp(timestamp),
            },
            FitField {
                name: "heart_rate",
                value: Value::Uint(heart_rate),
            },
            FitField {
                name: "temperature",
                value: Value::Int(-4),
            },
        ],
    )
}

#[test]
fn round_trip_preserves_encoded_fields() {
    let records: Vec<FitMessage> = (0..5)
        .map(|i| record(start() + TimeDelta::seconds(i), 120 + i as u64))
        .collect();

    let document = fit::encode_segment(&records, start());
    let decoded = fit::decode_reader(document.as_slice()).unwrap();

    assert_eq!(decoded.len(), records.len() + 1);

    let identity = &decoded[0];
    assert_eq!(identity.kind, MessageKind::FileId);
    assert_eq!(identity.field("type"), Some(&Value::Enum(4)));
    assert_eq!(identity.field("manufacturer"), Some(&Value::Uint(255)));
    assert_eq!(identity.field("serial_number"), Some(&Value::Uint(0x12345678)));
    assert_eq!(
        identity.field("time_created"),
        Some(&Value::Timestamp(start()))
    );

    for (original, decoded) in records.iter().zip(&decoded[1..]) {
        assert_eq!(decoded.kind, MessageKind::Record);
        assert_eq!(decoded.fields, original.fields);
        assert_eq!(decoded.timestamp, original.timestamp);
    }
}

#[test]
fn session_messages_survive_a_round_trip() {
    let session = FitMessage::new(
        MessageKind::Session,
        vec![
            FitField {
                name: "start_time",
                value: Value::Timestamp(start()),
            },
            FitField {
                name: "sport",
                value: Value::Enum(1),
            },
            FitField {
                name: "sport_profile_name",
                value: Value::Text("Trail".to_owned()),
            },
        ],
    );

    let document = fit::encode_segment([&session], start());
    let decoded = fit::decode_reader(document.as_slice()).unwrap();

    assert_eq!(decoded[1].fields, session.fields);
}

#[test]
fn definitions_interleave_with_changing_field_sets() {
    // Alternating field sets force definition re-emission; every data
    // record must still resolve against the right definition.
    let mut messages = Vec::new();
    for i in 0..6 {
        let mut fields = vec![FitField {
            name: "timestamp",
            value: Value::Timestamp(start() + TimeDelta::seconds(i)),
        }];
        if i % 2 == 0 {
            fields.push(FitField {
                name: "heart_rate",
                value: Value::Uint(100 + i as u64),
            });
        }
        messages.push(FitMessage::new(MessageKind::Record, fields));
    }

    let document = fit::encode_segment(&messages, start());
    let decoded = fit::decode_reader(document.as_slice()).unwrap();

    for (original, decoded) in messages.iter().zip(&decoded[1..]) {
        assert_eq!(decoded.fields, original.fields);
    }
}

#[test]
fn corrupted_payloads_fail_the_integrity_check() {
    let document = {
        let mut document = fit::encode_segment([&record(start(), 130)], start());
        let index = document.len() - 3;
        document[index] ^= 0xFF;
        document
    };

    assert!(matches!(
        fit::decode_reader(document.as_slice()),
        Err(FitError::CyclicRedundancyCheck { .. })
    ));
}

#[test]
fn rejects_wrong_file_type_marker() {
    let mut document = fit::encode_segment([&record(start(), 130)], start());
    document[8..12].copy_from_slice(b"XFIT");

    assert!(matches!(
        fit::decode_reader(document.as_slice()),
        Err(FitError::NotFitData)
    ));
}

#[test]
fn rejects_data_records_without_a_definition() {
    // A minimal document whose only record byte is a data record header
    // for a local message that was never defined.
    let mut document = vec![14, 0x10, 0, 0, 1, 0, 0, 0];
    document.extend_from_slice(b".FIT");
    document.extend_from_slice(&[0, 0]); // Header CRC (unchecked).
    document.push(0x03);

    assert!(matches!(
        fit::decode_reader(document.as_slice()),
        Err(FitError::UndefinedMessage { local: 3, .. })
    ));
}

#[test]
fn truncated_documents_error() {
    let document = fit::encode_segment([&record(start(), 130)], start());
    let truncated = &document[..document.len() - 4];

    assert!(fit::decode_reader(truncated).is_err());
}
