//! Nearest-neighbor alignment of interval samples onto record timestamps.

use chrono::{DateTime, TimeDelta, Utc};
use log::debug;
use thiserror::Error;

use crate::{
    fit::{FitField, FitMessage, MessageKind},
    kdf::KdfSample,
};

/// An error aligning two series.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Alignment was attempted with no timestamped records to bind to.
    #[error("No timestamped records to synchronize against.")]
    EmptySeries,
}

/// One record matched to one interval sample.
///
/// Created once per interval sample during synchronization and never
/// mutated afterward.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncedRecord {
    /// Fields copied from the matched record.
    pub fields: Vec<FitField>,
    /// The matched interval length in milliseconds.
    pub rr_interval_ms: f64,
    /// The interval sample's own reconstructed timestamp.
    pub rr_timestamp: DateTime<Utc>,
}

/// Pair every interval sample with its nearest-in-time record message.
///
/// Both series must be sorted by time, which lets a single forward cursor
/// cover the record series: for each sample the cursor advances while the
/// next record is strictly closer, so equidistant ties bind to the
/// earlier record. Samples denser than records share matches; output
/// preserves sample order.
pub fn synchronize(
    samples: &[KdfSample],
    messages: &[FitMessage],
) -> Result<Vec<SyncedRecord>, SyncError> {
    let records: Vec<(DateTime<Utc>, &FitMessage)> = messages
        .iter()
        .filter(|m| m.kind == MessageKind::Record)
        .filter_map(|m| m.timestamp.map(|t| (t, m)))
        .collect();

    if records.is_empty() && samples.iter().any(|s| s.timestamp.is_some()) {
        return Err(SyncError::EmptySeries);
    }

    let mut synced = Vec::with_capacity(samples.len());
    let mut cursor = 0;
    for sample in samples {
        let Some(timestamp) = sample.timestamp else {
            debug!("Skipping interval sample without a timestamp.");
            continue;
        };
        let Some(interval) = sample.value() else {
            debug!("Skipping interval sample without a value.");
            continue;
        };

        while cursor + 1 < records.len()
            && gap(records[cursor + 1].0, timestamp) < gap(records[cursor].0, timestamp)
        {
            cursor += 1;
        }

        synced.push(SyncedRecord {
            fields: records[cursor].1.fields.clone(),
            rr_interval_ms: interval,
            rr_timestamp: timestamp,
        });
    }

    Ok(synced)
}

fn gap(a: DateTime<Utc>, b: DateTime<Utc>) -> TimeDelta {
    (a - b).abs()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use crate::fit::Value;

    use super::*;

    fn at_ms(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap() + TimeDelta::milliseconds(ms)
    }

    fn record(ms: i64, heart_rate: u64) -> FitMessage {
        FitMessage::new(
            MessageKind::Record,
            vec![
                FitField {
                    name: "timestamp",
                    value: Value::Timestamp(at_ms(ms)),
                },
                FitField {
                    name: "heart_rate",
                    value: Value::Uint(heart_rate),
                },
            ],
        )
    }

    fn sample(ms: i64, interval: f64) -> KdfSample {
        KdfSample {
            timestamp: Some(at_ms(ms)),
            fields: vec![("rr".to_owned(), interval)],
        }
    }

    fn matched_heart_rate(synced: &SyncedRecord) -> u64 {
        synced
            .fields
            .iter()
            .find(|f| f.name == "heart_rate")
            .and_then(|f| f.value.as_f64())
            .unwrap() as u64
    }

    #[test]
    fn binds_each_sample_to_the_nearest_record() {
        let records: Vec<_> = (0..10).map(|i| record(i * 1000, 100 + i as u64)).collect();
        let samples = [sample(200, 800.0), sample(2600, 820.0), sample(8900, 810.0)];

        let synced = synchronize(&samples, &records).unwrap();

        assert_eq!(synced.len(), 3);
        assert_eq!(matched_heart_rate(&synced[0]), 100);
        assert_eq!(matched_heart_rate(&synced[1]), 103);
        assert_eq!(matched_heart_rate(&synced[2]), 109);
    }

    #[test]
    fn matches_brute_force_on_dense_input() {
        let records: Vec<_> = (0..40).map(|i| record(i * 700, i as u64)).collect();
        let samples: Vec<_> = (0..120).map(|i| sample(i * 230 + 17, 500.0)).collect();

        let synced = synchronize(&samples, &records).unwrap();

        for (sample, synced) in samples.iter().zip(&synced) {
            let timestamp = sample.timestamp.unwrap();
            let best = records
                .iter()
                .map(|r| (r.timestamp.unwrap() - timestamp).abs())
                .min()
                .unwrap();
            let bound = records
                .iter()
                .find(|r| {
                    r.field("heart_rate").and_then(Value::as_f64)
                        == Some(matched_heart_rate(synced) as f64)
                })
                .unwrap();
            assert_eq!((bound.timestamp.unwrap() - timestamp).abs(), best);
        }
    }

    #[test]
    fn equidistant_ties_prefer_the_earlier_record() {
        let records = [record(0, 1), record(1000, 2)];
        let samples = [sample(500, 750.0)];

        let synced = synchronize(&samples, &records).unwrap();
        assert_eq!(matched_heart_rate(&synced[0]), 1);
    }

    #[test]
    fn dense_samples_share_a_record() {
        let records = [record(0, 1)];
        let samples = [sample(100, 700.0), sample(200, 710.0), sample(300, 720.0)];

        let synced = synchronize(&samples, &records).unwrap();
        assert_eq!(synced.len(), 3);
        assert!(synced.iter().all(|s| matched_heart_rate(s) == 1));
        assert_eq!(synced[1].rr_interval_ms, 710.0);
        assert_eq!(synced[1].rr_timestamp, at_ms(200));
    }

    #[test]
    fn empty_record_series_is_an_error() {
        let samples = [sample(0, 800.0)];
        assert!(matches!(
            synchronize(&samples, &[]),
            Err(SyncError::EmptySeries)
        ));
    }

    #[test]
    fn empty_sample_series_yields_nothing() {
        let records = [record(0, 1)];
        let synced = synchronize(&[], &records).unwrap();
        assert!(synced.is_empty());
    }
}
