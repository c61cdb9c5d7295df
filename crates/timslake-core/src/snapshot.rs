//! Structured snapshot identity and the file naming scheme it maps onto.
//!
//! Every snapshot file is named `TIMS-<category>-snapshot-<YYYY-MM-DD-HH-MM-SS>.json`
//! and gains a `PROCESSED-` prefix once it has been consumed. The name is only a
//! rendering of [`SnapshotId`]; ordering and categorization always go through the
//! parsed identifier.

use std::fmt;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

pub const DATASTREAM: &str = "TIMS";
pub const PROCESSED_PREFIX: &str = "PROCESSED-";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";
const EXTENSION: &str = ".json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotCategory {
    Raw,
    Transformed,
}

impl SnapshotCategory {
    pub const ALL: [SnapshotCategory; 2] = [SnapshotCategory::Raw, SnapshotCategory::Transformed];

    /// Tag embedded in file names.
    pub fn tag(self) -> &'static str {
        match self {
            SnapshotCategory::Raw => "raw",
            SnapshotCategory::Transformed => "transformed",
        }
    }

    /// Upper-case label used in journal messages.
    pub fn label(self) -> &'static str {
        match self {
            SnapshotCategory::Raw => "RAW",
            SnapshotCategory::Transformed => "TRANSFORMED",
        }
    }

    fn name_prefix(self) -> String {
        format!("{DATASTREAM}-{}-snapshot-", self.tag())
    }
}

impl fmt::Display for SnapshotCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Category plus capture time, one-second resolution.
///
/// Field order matters: the derived `Ord` compares `taken_at` first, so sorting a
/// list of ids is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotId {
    pub taken_at: NaiveDateTime,
    pub category: SnapshotCategory,
}

impl SnapshotId {
    pub fn new(category: SnapshotCategory, taken_at: NaiveDateTime) -> Self {
        Self {
            taken_at: taken_at.with_nanosecond(0).unwrap_or(taken_at),
            category,
        }
    }

    /// Name of the file while it sits in an incoming directory.
    pub fn file_name(&self) -> String {
        format!(
            "{}{}{EXTENSION}",
            self.category.name_prefix(),
            self.taken_at.format(TIMESTAMP_FORMAT)
        )
    }

    /// Name of the file once it has been moved to the archive.
    pub fn processed_file_name(&self) -> String {
        processed_name(&self.file_name())
    }

    /// Parses either an incoming or a processed file name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let name = name.strip_prefix(PROCESSED_PREFIX).unwrap_or(name);
        let stem = name.strip_suffix(EXTENSION)?;

        SnapshotCategory::ALL.into_iter().find_map(|category| {
            let timestamp = stem.strip_prefix(&category.name_prefix())?;
            let taken_at = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?;
            Some(SnapshotId { taken_at, category })
        })
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

pub fn processed_name(name: &str) -> String {
    format!("{PROCESSED_PREFIX}{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 17)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn renders_zero_padded_file_names() {
        let id = SnapshotId::new(SnapshotCategory::Raw, at(9, 5, 3));
        assert_eq!(id.file_name(), "TIMS-raw-snapshot-2025-07-17-09-05-03.json");
        assert_eq!(
            id.processed_file_name(),
            "PROCESSED-TIMS-raw-snapshot-2025-07-17-09-05-03.json"
        );
    }

    #[test]
    fn parses_incoming_and_processed_names() {
        let id = SnapshotId::new(SnapshotCategory::Transformed, at(23, 59, 59));
        assert_eq!(SnapshotId::from_file_name(&id.file_name()), Some(id));
        assert_eq!(SnapshotId::from_file_name(&id.processed_file_name()), Some(id));
    }

    #[test]
    fn rejects_names_outside_the_scheme() {
        for name in [
            "notes.txt",
            "TIMS-raw-snapshot-yesterday.json",
            "TIMS-raw-transformed-snapshot-2025-07-17-09-05-03.json",
            "TIMS-raw-snapshot-2025-07-17-09-05-03.json.bak",
            "OTHER-raw-snapshot-2025-07-17-09-05-03.json",
        ] {
            assert_eq!(SnapshotId::from_file_name(name), None, "{name}");
        }
    }

    #[test]
    fn truncates_sub_second_precision() {
        let precise = at(1, 2, 3).with_nanosecond(750_000_000).unwrap();
        let id = SnapshotId::new(SnapshotCategory::Raw, precise);
        assert_eq!(id.taken_at, at(1, 2, 3));
    }

    #[test]
    fn orders_chronologically() {
        let mut ids = vec![
            SnapshotId::new(SnapshotCategory::Raw, at(12, 0, 0)),
            SnapshotId::new(SnapshotCategory::Raw, at(9, 0, 0)),
            SnapshotId::new(SnapshotCategory::Raw, at(10, 30, 0)),
        ];
        ids.sort();
        let hours: Vec<u32> = ids.iter().map(|id| id.taken_at.hour()).collect();
        assert_eq!(hours, vec![9, 10, 12]);
    }
}
