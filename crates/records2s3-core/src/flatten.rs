//! Record flattening
//!
//! Collapses nested mappings into a single level using separator-joined keys:
//! `{"meta": {"a": 1}}` becomes `{"meta__a": 1}`. Lists are stored as JSON text
//! and empty mappings as null, since columnar encoders cannot hold empty structs.
//!
//! Keys whose joined length reaches `max_key_length` are shortened segment by
//! segment, outermost first. Shortening is lossy: two distinct long paths may
//! map to the same flattened key.

use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::Value;
use std::io;

use crate::Record;

pub const DEFAULT_SEPARATOR: &str = "__";
pub const DEFAULT_MAX_KEY_LENGTH: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenOptions {
    pub separator: String,
    pub max_key_length: usize,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            max_key_length: DEFAULT_MAX_KEY_LENGTH,
        }
    }
}

/// Flatten a record into a new single-level record.
///
/// Fields are visited in sorted key order at every level, so structurally
/// identical records always produce the same key ordering. The input is not
/// modified.
pub fn flatten_record(record: &Record, options: &FlattenOptions) -> Record {
    let mut out = Record::new();
    let mut path = Vec::new();
    flatten_into(record, &mut path, options, &mut out);
    out
}

fn flatten_into<'a>(
    map: &'a Record,
    path: &mut Vec<&'a str>,
    options: &FlattenOptions,
    out: &mut Record,
) {
    let mut entries: Vec<(&'a String, &'a Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (key, value) in entries {
        path.push(key.as_str());
        match value {
            Value::Object(nested) if !nested.is_empty() => {
                flatten_into(nested, path, options, out);
            }
            Value::Object(_) => {
                out.insert(flatten_key(path, options), Value::Null);
            }
            Value::Array(_) => {
                let text = to_json_text(value);
                out.insert(flatten_key(path, options), Value::String(text));
            }
            scalar => {
                out.insert(flatten_key(path, options), scalar.clone());
            }
        }
        path.pop();
    }
}

/// Join a key path, abbreviating segments until it fits under the length limit
pub fn flatten_key(path: &[&str], options: &FlattenOptions) -> String {
    let mut segments: Vec<String> = path.iter().map(|s| s.to_string()).collect();
    let mut index = 0;

    while joined_len(&segments, &options.separator) >= options.max_key_length
        && index < segments.len()
    {
        segments[index] = abbreviate(&segments[index]);
        index += 1;
    }

    segments.join(&options.separator)
}

fn joined_len(segments: &[String], separator: &str) -> usize {
    let chars: usize = segments.iter().map(|s| s.chars().count()).sum();
    chars + separator.chars().count() * segments.len().saturating_sub(1)
}

/// Uppercase skeleton of the camel-cased segment, or its first three chars
/// when the skeleton is a single character.
fn abbreviate(segment: &str) -> String {
    let skeleton: String = camelize(segment)
        .chars()
        .filter(|c| !c.is_ascii_lowercase())
        .collect();

    let chosen = if skeleton.chars().count() > 1 {
        skeleton
    } else {
        segment.chars().take(3).collect()
    };
    chosen.to_lowercase()
}

/// `user_profile` -> `UserProfile`
fn camelize(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();

    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
    }
    while let Some(c) = chars.next() {
        if c != '_' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next) => out.extend(next.to_uppercase()),
            None => out.push(c),
        }
    }
    out
}

/// Encode a value as JSON text laid out like Python's `json.dumps`:
/// `", "` between items, `": "` after keys, non-ASCII escaped.
pub fn to_json_text(value: &Value) -> String {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    if value.serialize(&mut ser).is_err() {
        return value.to_string();
    }
    String::from_utf8(buf).unwrap_or_else(|_| value.to_string())
}

struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for c in fragment.chars() {
            if c.is_ascii() {
                writer.write_all(&[c as u8])?;
            } else {
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}
