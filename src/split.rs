//! Writing per-segment files for a multisport recording.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    slice,
};

use chrono::Utc;
use either::Either::{Left, Right};
use log::debug;

use crate::{Error, fit, multisport};

/// Split a multisport FIT file into one output file per sport segment and
/// per transition event.
///
/// Output names derive from `output`: `<stem>_<suffix><ext>`, where the
/// suffix is the segment's sport label, or `transitionN` for the N-th
/// transition. When two units reduce to the same suffix, occurrences
/// after the first gain an increasing numeric suffix (`run`, `run1`, …).
/// Every output file is independently playable: each starts with a
/// synthesized file identity.
///
/// The progress callback runs once per completed file with the number
/// written so far and the total. Returns the written paths in write
/// order.
pub fn write_split_files(
    input: &Path,
    output: &Path,
    mut on_progress: impl FnMut(usize, usize),
) -> Result<Vec<PathBuf>, Error> {
    let messages = fit::decode_file(input)?;
    let split = multisport::split_sessions(&messages);
    let total = split.segments.len() + split.transitions.len();

    let directory = output.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "activity".to_owned());
    let extension = output
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "fit".to_owned());

    let units = split
        .segments
        .iter()
        .map(Left)
        .chain(split.transitions.iter().enumerate().map(Right));

    let mut occurrences: HashMap<String, usize> = HashMap::new();
    let mut written = Vec::with_capacity(total);

    for unit in units {
        let (raw, messages) = match unit {
            Left(segment) => (
                segment.session.sport.label().replace(' ', "_"),
                segment.messages.as_slice(),
            ),
            Right((index, message)) => (format!("transition{}", index + 1), slice::from_ref(message)),
        };

        let count = occurrences.entry(raw.clone()).or_insert(0);
        let suffix = if *count == 0 {
            raw.clone()
        } else {
            format!("{raw}{count}")
        };
        *count += 1;

        let path = directory.join(format!("{stem}_{suffix}.{extension}"));
        let document = fit::encode_segment(messages.iter().copied(), Utc::now());
        fs::write(&path, document)?;
        debug!("Wrote {}.", path.display());

        written.push(path);
        on_progress(written.len(), total);
    }

    Ok(written)
}
