//! Splitting a decoded message stream into per-sport segments.

use chrono::{DateTime, Utc};
use log::debug;

use crate::fit::{FitMessage, MessageKind, Value, profile};

/// Sport identifiers carried by session messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sport {
    Generic,
    Running,
    Cycling,
    Transition,
    FitnessEquipment,
    Swimming,
    Walking,
    Hiking,
    Unknown(u8),
}

impl Sport {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Sport::Generic,
            1 => Sport::Running,
            2 => Sport::Cycling,
            3 => Sport::Transition,
            4 => Sport::FitnessEquipment,
            5 => Sport::Swimming,
            11 => Sport::Walking,
            17 => Sport::Hiking,
            code => Sport::Unknown(code),
        }
    }

    /// Lowercase label, used for split file suffixes.
    pub fn label(self) -> String {
        match self {
            Sport::Generic => "generic".to_owned(),
            Sport::Running => "running".to_owned(),
            Sport::Cycling => "cycling".to_owned(),
            Sport::Transition => "transition".to_owned(),
            Sport::FitnessEquipment => "fitness_equipment".to_owned(),
            Sport::Swimming => "swimming".to_owned(),
            Sport::Walking => "walking".to_owned(),
            Sport::Hiking => "hiking".to_owned(),
            Sport::Unknown(code) => format!("sport_{code}"),
        }
    }
}

/// One contiguous sport activity derived from a session message.
///
/// The end is derived, not stored: it is the start of the next session in
/// chronological order, or open for the final session. Sessions partition
/// the timeline into contiguous half-open intervals.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Session {
    pub sport: Sport,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl Session {
    /// Whether a timestamp falls in this session's half-open interval.
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && self.end.map_or(true, |end| timestamp < end)
    }
}

/// A session paired with the messages whose timestamps fall in its
/// interval.
#[derive(Debug)]
pub struct Segment<'a> {
    pub session: Session,
    pub messages: Vec<&'a FitMessage>,
}

/// The result of segmenting a multisport stream.
#[derive(Debug)]
pub struct SessionSplit<'a> {
    pub segments: Vec<Segment<'a>>,
    /// Transition events, in original stream order. Never bucketed into a
    /// segment.
    pub transitions: Vec<&'a FitMessage>,
}

/// Split a decoded message stream into per-sport segments plus transition
/// events.
///
/// Messages with no timestamp, or timestamped before every session, are
/// dropped from segment buckets. Each remaining timestamped message lands
/// in exactly one segment. The sweep is linear in the combined count of
/// messages and sessions.
pub fn split_sessions(messages: &[FitMessage]) -> SessionSplit<'_> {
    let mut sessions: Vec<Session> = messages
        .iter()
        .filter(|m| m.kind == MessageKind::Session)
        .filter_map(session_bounds)
        .collect();
    sessions.sort_by_key(|s| s.start);

    let next_starts: Vec<_> = sessions.iter().skip(1).map(|s| s.start).collect();
    for (session, end) in sessions.iter_mut().zip(next_starts) {
        session.end = Some(end);
    }

    let mut segments: Vec<Segment> = sessions
        .into_iter()
        .map(|session| Segment {
            session,
            messages: Vec::new(),
        })
        .collect();

    let mut timestamped: Vec<(DateTime<Utc>, &FitMessage)> = messages
        .iter()
        .filter(|m| !is_transition(m))
        .filter_map(|m| m.timestamp.map(|t| (t, m)))
        .collect();
    timestamped.sort_by_key(|(timestamp, _)| *timestamp);

    // Both sides are sorted and session intervals are contiguous, so a
    // single forward cursor assigns every message.
    let mut cursor = 0;
    for (timestamp, message) in timestamped {
        while cursor < segments.len()
            && matches!(segments[cursor].session.end, Some(end) if timestamp >= end)
        {
            cursor += 1;
        }
        match segments.get_mut(cursor) {
            Some(segment) if timestamp >= segment.session.start => segment.messages.push(message),
            _ => {} // Before the first session, or no sessions at all.
        }
    }

    let transitions: Vec<&FitMessage> = messages.iter().filter(|m| is_transition(m)).collect();

    debug!(
        "Split into {} segments and {} transitions.",
        segments.len(),
        transitions.len()
    );

    SessionSplit {
        segments,
        transitions,
    }
}

/// Whether a message is a multisport transition event.
pub fn is_transition(message: &FitMessage) -> bool {
    message.kind == MessageKind::Event
        && matches!(
            message.field("event_type"),
            Some(Value::Enum(code)) if *code == profile::EVENT_TYPE_TRANSITION
        )
}

fn session_bounds(message: &FitMessage) -> Option<Session> {
    let start = message.field("start_time")?.as_timestamp()?;
    let sport = match message.field("sport") {
        Some(Value::Enum(code)) => Sport::from_code(*code),
        _ => Sport::Generic,
    };

    Some(Session {
        sport,
        start,
        end: None,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use crate::fit::FitField;

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, m, s).unwrap()
    }

    fn session(sport: u8, start: DateTime<Utc>) -> FitMessage {
        FitMessage::new(
            MessageKind::Session,
            vec![
                FitField {
                    name: "start_time",
                    value: Value::Timestamp(start),
                },
                FitField {
                    name: "sport",
                    value: Value::Enum(sport),
                },
            ],
        )
    }

    fn record(timestamp: DateTime<Utc>) -> FitMessage {
        FitMessage::new(
            MessageKind::Record,
            vec![FitField {
                name: "timestamp",
                value: Value::Timestamp(timestamp),
            }],
        )
    }

    fn transition(timestamp: DateTime<Utc>) -> FitMessage {
        FitMessage::new(
            MessageKind::Event,
            vec![
                FitField {
                    name: "timestamp",
                    value: Value::Timestamp(timestamp),
                },
                FitField {
                    name: "event_type",
                    value: Value::Enum(profile::EVENT_TYPE_TRANSITION),
                },
            ],
        )
    }

    #[test]
    fn session_ends_derive_from_next_start() {
        let messages = vec![
            session(2, at(10, 30, 0)),
            session(1, at(10, 0, 0)),
            record(at(10, 15, 0)),
        ];

        let split = split_sessions(&messages);
        let sessions: Vec<_> = split.segments.iter().map(|s| s.session).collect();

        assert_eq!(sessions[0].sport, Sport::Running);
        assert_eq!(sessions[0].end, Some(at(10, 30, 0)));
        assert_eq!(sessions[1].sport, Sport::Cycling);
        assert_eq!(sessions[1].end, None);
    }

    #[test]
    fn records_bucket_by_half_open_interval() {
        let messages = vec![
            session(1, at(10, 0, 0)),
            session(2, at(10, 30, 0)),
            record(at(10, 29, 59)),
            record(at(10, 30, 0)),
        ];

        let split = split_sessions(&messages);

        let running = &split.segments[0];
        let cycling = &split.segments[1];
        assert_eq!(running.messages.len(), 1);
        assert_eq!(running.messages[0].timestamp, Some(at(10, 29, 59)));
        assert_eq!(cycling.messages.len(), 1);
        assert_eq!(cycling.messages[0].timestamp, Some(at(10, 30, 0)));
    }

    #[test]
    fn early_and_untimed_messages_are_dropped() {
        let messages = vec![
            session(1, at(10, 0, 0)),
            record(at(9, 59, 59)),
            FitMessage::new(MessageKind::Record, vec![]),
        ];

        let split = split_sessions(&messages);
        assert!(split.segments[0].messages.is_empty());
    }

    #[test]
    fn transitions_collect_separately() {
        let messages = vec![
            session(1, at(10, 0, 0)),
            transition(at(10, 10, 0)),
            record(at(10, 10, 0)),
        ];

        let split = split_sessions(&messages);

        assert_eq!(split.transitions.len(), 1);
        // The transition never lands in a bucket, even though its
        // timestamp falls inside the session.
        assert_eq!(split.segments[0].messages.len(), 1);
        assert_eq!(split.segments[0].messages[0].kind, MessageKind::Record);
    }

    #[test]
    fn sweep_matches_brute_force_containment() {
        let starts = [at(10, 0, 0), at(10, 20, 0), at(11, 0, 0)];
        let mut messages: Vec<_> = starts.iter().map(|&s| session(0, s)).collect();
        for minute in 0..90 {
            messages.push(record(at(9, 30, 0) + chrono::TimeDelta::minutes(minute)));
        }

        let split = split_sessions(&messages);

        for segment in &split.segments {
            for minute in 0..90 {
                let timestamp = at(9, 30, 0) + chrono::TimeDelta::minutes(minute);
                let swept = segment
                    .messages
                    .iter()
                    .filter(|m| m.kind == MessageKind::Record)
                    .any(|m| m.timestamp == Some(timestamp));
                let contained = segment.session.contains(timestamp);
                assert_eq!(swept, contained);
            }
        }
    }

    #[test]
    fn no_sessions_yields_no_segments() {
        let messages = vec![record(at(10, 0, 0))];
        let split = split_sessions(&messages);
        assert!(split.segments.is_empty());
        assert!(split.transitions.is_empty());
    }
}
