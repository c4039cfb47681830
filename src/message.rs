//! Singer message lines
//!
//! One JSON object per line, discriminated by its `type` field. Fields the
//! sink does not act on (`time_extracted`, `key_properties`, ...) are ignored.

use anyhow::{Context, Result};
use records2s3_core::Record;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    Record {
        stream: String,
        record: Record,
    },
    Schema {
        stream: String,
        schema: Value,
    },
    State {
        value: Value,
    },
    ActivateVersion {
        stream: String,
        version: i64,
    },
}

pub fn parse_line(line: &str) -> Result<Message> {
    serde_json::from_str(line).context("Failed to parse Singer message")
}
