//! Storage key generation for time-based organization
//!
//! Generates keys of the form:
//! {prefix}/{stream}/{year}/{month}/{day}/.../{yyyymmdd-hh...}
//!
//! Folder and file-name date components are controlled independently by a
//! [`DateGrain`]; a grain includes every calendar unit coarser than or equal
//! to itself.

use chrono::{Datelike, NaiveDateTime, Timelike};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Calendar unit used to cut date partitions, ordered from coarsest (7) to finest (1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DateGrain {
    Microsecond = 1,
    Second = 2,
    Minute = 3,
    Hour = 4,
    Day = 5,
    Month = 6,
    Year = 7,
}

impl DateGrain {
    pub const ALL: [DateGrain; 7] = [
        DateGrain::Year,
        DateGrain::Month,
        DateGrain::Day,
        DateGrain::Hour,
        DateGrain::Minute,
        DateGrain::Second,
        DateGrain::Microsecond,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DateGrain::Year => "year",
            DateGrain::Month => "month",
            DateGrain::Day => "day",
            DateGrain::Hour => "hour",
            DateGrain::Minute => "minute",
            DateGrain::Second => "second",
            DateGrain::Microsecond => "microsecond",
        }
    }

    /// Whether a component of the given unit is fine enough to be emitted
    fn includes(self, unit: DateGrain) -> bool {
        self.ordinal() <= unit.ordinal()
    }
}

impl fmt::Display for DateGrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateGrain {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.to_lowercase();
        DateGrain::ALL
            .into_iter()
            .find(|grain| grain.as_str() == lowered)
            .ok_or_else(|| CoreError::UnknownGrain(s.to_string()))
    }
}

/// Immutable partitioning settings, built once per sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionConfig {
    pub prefix: String,
    pub stream_name_override: Option<String>,
    /// `None` when date folders are disabled
    pub folder_grain: Option<DateGrain>,
    /// `None` when the date file name is disabled
    pub file_grain: Option<DateGrain>,
}

impl PartitionConfig {
    /// Build from the raw option values, parsing a grain only when its flag is on
    pub fn from_options(
        prefix: impl Into<String>,
        stream_name_override: Option<String>,
        append_date_to_prefix: bool,
        prefix_grain: &str,
        append_date_to_filename: bool,
        filename_grain: &str,
    ) -> Result<Self> {
        let folder_grain = if append_date_to_prefix {
            Some(prefix_grain.parse()?)
        } else {
            None
        };
        let file_grain = if append_date_to_filename {
            Some(filename_grain.parse()?)
        } else {
            None
        };

        Ok(Self {
            prefix: prefix.into(),
            stream_name_override,
            folder_grain,
            file_grain,
        })
    }
}

/// Identity of a batch handed over by the batching layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchContext {
    pub stream_name: String,
    pub batch_start: NaiveDateTime,
}

impl BatchContext {
    pub fn new(stream_name: impl Into<String>, batch_start: NaiveDateTime) -> Result<Self> {
        let stream_name = stream_name.into();
        if stream_name.is_empty() {
            return Err(CoreError::EmptyStreamName);
        }
        Ok(Self {
            stream_name,
            batch_start,
        })
    }
}

/// Build the storage key stem for a batch.
///
/// Pure and deterministic: identical inputs always yield the same key.
/// Format and compression extensions are appended by the writer at upload.
pub fn build_key(stream_name: &str, batch_start: NaiveDateTime, config: &PartitionConfig) -> String {
    let stream = config
        .stream_name_override
        .as_deref()
        .unwrap_or(stream_name);

    let mut key = format!("{}/{}/", config.prefix, stream);
    if let Some(grain) = config.folder_grain {
        key.push_str(&folder_structure(batch_start, grain));
    }
    if let Some(grain) = config.file_grain {
        key.push_str(&file_structure(batch_start, grain));
    }
    key
}

/// Folder components down to `grain`, each followed by `/`
pub fn folder_structure(ts: NaiveDateTime, grain: DateGrain) -> String {
    date_components(ts, grain)
        .into_iter()
        .map(|(_, value)| format!("{}/", value))
        .collect()
}

/// File-name components down to `grain`, with `-` between day and hour
pub fn file_structure(ts: NaiveDateTime, grain: DateGrain) -> String {
    date_components(ts, grain)
        .into_iter()
        .map(|(unit, value)| {
            if unit == DateGrain::Hour {
                format!("-{}", value)
            } else {
                value
            }
        })
        .collect()
}

fn date_components(ts: NaiveDateTime, grain: DateGrain) -> Vec<(DateGrain, String)> {
    // Sub-second part of a leap second is folded back into the regular range
    let micros = (ts.nanosecond() / 1_000) % 1_000_000;

    [
        (DateGrain::Year, ts.year().to_string()),
        (DateGrain::Month, format!("{:02}", ts.month())),
        (DateGrain::Day, format!("{:02}", ts.day())),
        (DateGrain::Hour, format!("{:02}", ts.hour())),
        (DateGrain::Minute, format!("{:02}", ts.minute())),
        (DateGrain::Second, format!("{:02}", ts.second())),
        (DateGrain::Microsecond, micros.to_string()),
    ]
    .into_iter()
    .filter(|(unit, _)| grain.includes(*unit))
    .collect()
}
