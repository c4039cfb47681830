//! Batch preprocessing shared by every format writer
//!
//! Applies, in order, only the enabled transforms:
//! 1. process-date stamping (`_PROCESS_DATE`)
//! 2. flattening
//!
//! The input batch is never mutated; a new record list is returned.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::flatten::{flatten_record, FlattenOptions};
use crate::Record;

pub const PROCESS_DATE_FIELD: &str = "_PROCESS_DATE";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preprocessor {
    include_process_date: bool,
    flatten: Option<FlattenOptions>,
}

impl Preprocessor {
    pub fn new(include_process_date: bool, flatten: Option<FlattenOptions>) -> Self {
        Self {
            include_process_date,
            flatten,
        }
    }

    pub fn includes_process_date(&self) -> bool {
        self.include_process_date
    }

    pub fn flattens(&self) -> bool {
        self.flatten.is_some()
    }

    /// Preprocess a batch using the current UTC time for stamping
    pub fn apply(&self, records: &[Record]) -> Vec<Record> {
        self.apply_at(records, Utc::now())
    }

    /// Preprocess a batch, stamping every record with `now`
    pub fn apply_at(&self, records: &[Record], now: DateTime<Utc>) -> Vec<Record> {
        let stamp = self
            .include_process_date
            .then(|| Value::String(process_date(now)));

        records
            .iter()
            .map(|record| {
                let mut record = record.clone();
                if let Some(stamp) = &stamp {
                    record.insert(PROCESS_DATE_FIELD.to_string(), stamp.clone());
                }
                match &self.flatten {
                    Some(options) => flatten_record(&record, options),
                    None => record,
                }
            })
            .collect()
    }
}

/// ISO-8601 without offset, microsecond precision: `2024-01-15T14:30:00.000000`
fn process_date(now: DateTime<Utc>) -> String {
    now.naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap()
    }

    #[test]
    fn test_disabled_preprocessor_is_identity() {
        let batch = vec![record(json!({"b": {"c": 1}, "a": 2}))];
        let out = Preprocessor::default().apply_at(&batch, now());
        assert_eq!(out, batch);
    }

    #[test]
    fn test_process_date_is_stamped_on_every_record() {
        let batch = vec![record(json!({"id": 1})), record(json!({"id": 2}))];
        let out = Preprocessor::new(true, None).apply_at(&batch, now());

        assert_eq!(out.len(), 2);
        for rec in &out {
            assert_eq!(
                rec.get(PROCESS_DATE_FIELD),
                Some(&json!("2024-01-15T14:30:00.000000"))
            );
        }
        // The original batch stays untouched
        assert!(batch[0].get(PROCESS_DATE_FIELD).is_none());
    }

    #[test]
    fn test_stamp_then_flatten() {
        let batch = vec![record(json!({"meta": {"a": 1}, "id": 7}))];
        let out =
            Preprocessor::new(true, Some(FlattenOptions::default())).apply_at(&batch, now());

        let keys: Vec<&str> = out[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec![PROCESS_DATE_FIELD, "id", "meta__a"]);
    }

    #[test]
    fn test_record_order_is_preserved() {
        let batch: Vec<Record> = (0..5).map(|i| record(json!({"n": {"i": i}}))).collect();
        let out = Preprocessor::new(false, Some(FlattenOptions::default())).apply_at(&batch, now());
        let ids: Vec<i64> = out
            .iter()
            .map(|r| r.get("n__i").and_then(Value::as_i64).unwrap())
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }
}
