// End-to-end integration tests for records2s3
//
// Singer messages in, compressed objects out, against an in-memory store.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use flate2::read::GzDecoder;
use records2s3::{Sink, SinkSummary};
use records2s3_config::SinkConfig;
use records2s3_writer::{FormatRegistry, StorageClient};
use std::io::Read;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

fn batch_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(14, 30, 0)
        .unwrap()
}

fn memory_storage() -> StorageClient {
    let operator = opendal::Operator::new(opendal::services::Memory::default())
        .unwrap()
        .finish();
    StorageClient::from_operator(operator, "b")
}

/// Each call is one second after the previous one
fn ticking_clock() -> records2s3::Clock {
    let ticks = Arc::new(AtomicI64::new(0));
    Box::new(move || batch_start() + Duration::seconds(ticks.fetch_add(1, Ordering::SeqCst)))
}

fn config(filename_grain: &str, extra: &str) -> SinkConfig {
    SinkConfig::from_toml(&format!(
        r#"
bucket = "b"
prefix = "p"
format_type = "jsonl"
append_date_to_prefix_grain = "day"
append_date_to_filename_grain = "{}"
flatten_records = true
{}
"#,
        filename_grain, extra
    ))
    .unwrap()
}

async fn read_gz(storage: &StorageClient, key: &str) -> String {
    let body = storage.operator().read(key).await.unwrap().to_vec();
    let mut text = String::new();
    GzDecoder::new(body.as_slice())
        .read_to_string(&mut text)
        .unwrap();
    text
}

const USERS: &str = r#"{"type":"SCHEMA","stream":"users","schema":{"type":"object"},"key_properties":["id"]}
{"type":"RECORD","stream":"users","record":{"id":1,"meta":{"a":1,"b":2}}}
{"type":"STATE","value":{"bookmarks":{"users":1}}}
"#;

#[tokio::test]
async fn test_single_batch_lands_under_partitioned_key() {
    let storage = memory_storage();
    let mut sink = Sink::new(config("hour", ""), FormatRegistry::builtin(), storage.clone())
        .unwrap()
        .with_clock(ticking_clock());

    let mut output = Vec::new();
    let summary = sink.run(USERS.as_bytes(), &mut output).await.unwrap();

    assert_eq!(
        summary,
        SinkSummary {
            batches: 1,
            records: 1,
            keys: vec!["p/users/2024/01/15/20240115-14.jsonl.gz".to_string()],
        }
    );
    assert_eq!(
        read_gz(&storage, &summary.keys[0]).await,
        "{\"id\":1,\"meta__a\":1,\"meta__b\":2}\n"
    );
    assert_eq!(
        String::from_utf8(output).unwrap(),
        "{\"type\":\"STATE\",\"value\":{\"bookmarks\":{\"users\":1}}}\n"
    );
}

#[tokio::test]
async fn test_max_rows_splits_batches() {
    let storage = memory_storage();
    let config = config("second", "[batch]\nmax_rows = 2");
    let mut sink = Sink::new(config, FormatRegistry::builtin(), storage.clone())
        .unwrap()
        .with_clock(ticking_clock());

    let mut input = String::from(
        r#"{"type":"SCHEMA","stream":"events","schema":{}}
"#,
    );
    for i in 0..5 {
        input.push_str(&format!(
            "{{\"type\":\"RECORD\",\"stream\":\"events\",\"record\":{{\"n\":{}}}}}\n",
            i
        ));
    }

    let summary = sink.run(input.as_bytes(), Vec::new()).await.unwrap();
    assert_eq!(summary.batches, 3);
    assert_eq!(summary.records, 5);
    assert_eq!(
        summary.keys,
        vec![
            "p/events/2024/01/15/20240115-143000.jsonl.gz",
            "p/events/2024/01/15/20240115-143001.jsonl.gz",
            "p/events/2024/01/15/20240115-143002.jsonl.gz",
        ]
    );
    assert_eq!(read_gz(&storage, &summary.keys[2]).await, "{\"n\":4}\n");
}

#[tokio::test]
async fn test_batches_sharing_a_key_fail_instead_of_overwriting() {
    let storage = memory_storage();
    let config = config("day", "[batch]\nmax_rows = 2");
    let mut sink = Sink::new(config, FormatRegistry::builtin(), storage.clone())
        .unwrap()
        .with_clock(Box::new(batch_start));

    let mut input = String::from(
        r#"{"type":"SCHEMA","stream":"e","schema":{}}
"#,
    );
    for i in 0..5 {
        input.push_str(&format!(
            "{{\"type\":\"RECORD\",\"stream\":\"e\",\"record\":{{\"n\":{}}}}}\n",
            i
        ));
    }
    input.push_str("{\"type\":\"STATE\",\"value\":{\"n\":4}}\n");

    let mut output = Vec::new();
    let err = sink.run(input.as_bytes(), &mut output).await.unwrap_err();
    assert!(err.to_string().contains("would overwrite"), "{:#}", err);
    assert!(output.is_empty(), "no STATE after a failed batch");

    // The first batch is intact
    assert_eq!(
        read_gz(&storage, "p/e/2024/01/15/20240115.jsonl.gz").await,
        "{\"n\":0}\n{\"n\":1}\n"
    );
}

#[tokio::test]
async fn test_streams_are_written_separately() {
    let storage = memory_storage();
    let mut sink = Sink::new(config("hour", ""), FormatRegistry::builtin(), storage.clone())
        .unwrap()
        .with_clock(ticking_clock());

    let input = r#"{"type":"SCHEMA","stream":"users","schema":{}}
{"type":"SCHEMA","stream":"orders","schema":{}}
{"type":"RECORD","stream":"users","record":{"id":1}}
{"type":"RECORD","stream":"orders","record":{"id":10}}
{"type":"RECORD","stream":"users","record":{"id":2}}
"#;

    let summary = sink.run(input.as_bytes(), Vec::new()).await.unwrap();
    assert_eq!(summary.batches, 2);
    // Streams drain in name order
    assert!(summary.keys[0].starts_with("p/orders/"));
    assert!(summary.keys[1].starts_with("p/users/"));
    assert_eq!(
        read_gz(&storage, &summary.keys[1]).await,
        "{\"id\":1}\n{\"id\":2}\n"
    );
}

#[tokio::test]
async fn test_schema_change_flushes_buffered_records() {
    let storage = memory_storage();
    let config = config("second", "");
    let mut sink = Sink::new(config, FormatRegistry::builtin(), storage.clone())
        .unwrap()
        .with_clock(ticking_clock());

    let input = r#"{"type":"SCHEMA","stream":"users","schema":{"v":1}}
{"type":"RECORD","stream":"users","record":{"id":1}}
{"type":"SCHEMA","stream":"users","schema":{"v":2}}
{"type":"RECORD","stream":"users","record":{"id":2,"email":"x"}}
"#;

    let summary = sink.run(input.as_bytes(), Vec::new()).await.unwrap();
    assert_eq!(summary.batches, 2);
    assert_eq!(read_gz(&storage, &summary.keys[0]).await, "{\"id\":1}\n");
}

#[tokio::test]
async fn test_invalid_line_reports_its_number() {
    let mut sink =
        Sink::new(config("hour", ""), FormatRegistry::builtin(), memory_storage()).unwrap();
    let input = "{\"type\":\"SCHEMA\",\"stream\":\"users\",\"schema\":{}}\n{oops\n";

    let err = sink.run(input.as_bytes(), Vec::new()).await.unwrap_err();
    assert!(err.to_string().contains("line 2"), "{:#}", err);
}
