//! Columnar Parquet output
//!
//! Columns are the sorted union of field names across the batch. Each column
//! takes one Arrow type inferred from its non-null values:
//!
//! | values                 | Arrow type            |
//! |------------------------|-----------------------|
//! | booleans               | `Boolean`             |
//! | integers               | `Int64`               |
//! | floats, or int + float | `Float64`             |
//! | strings                | `Utf8`                |
//! | lists / mappings       | `Utf8` holding JSON   |
//! | only nulls             | `Utf8`, all null      |
//!
//! Any other mix fails the batch while preparing it, naming the field.
//! The codec is applied inside the file per column chunk.

use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, RecordBatch, StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use records2s3_core::{flatten::to_json_text, Record};
use serde_json::Value;
use std::sync::Arc;

use crate::context::WriterContext;
use crate::encoding::writer_properties;
use crate::error::Result;
use crate::format::{column_names, FormatWriter};

#[derive(Debug, Clone)]
pub struct ParquetWriter {
    context: WriterContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Boolean,
    Int64,
    Float64,
    Utf8,
    Json,
}

impl ColumnKind {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Boolean),
            Value::Number(n) if n.is_i64() => Some(Self::Int64),
            Value::Number(_) => Some(Self::Float64),
            Value::String(_) => Some(Self::Utf8),
            Value::Array(_) | Value::Object(_) => Some(Self::Json),
        }
    }

    /// Widen two observed kinds, `None` when they cannot share a column
    fn merge(self, other: Self) -> Option<Self> {
        match (self, other) {
            (a, b) if a == b => Some(a),
            (Self::Int64, Self::Float64) | (Self::Float64, Self::Int64) => Some(Self::Float64),
            _ => None,
        }
    }

    fn data_type(self) -> DataType {
        match self {
            Self::Boolean => DataType::Boolean,
            Self::Int64 => DataType::Int64,
            Self::Float64 => DataType::Float64,
            Self::Utf8 | Self::Json => DataType::Utf8,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Int64 => "integer",
            Self::Float64 => "float",
            Self::Utf8 => "string",
            Self::Json => "nested",
        }
    }
}

impl ParquetWriter {
    pub fn new(context: WriterContext) -> Self {
        Self { context }
    }

    pub(crate) fn boxed(context: WriterContext) -> Box<dyn FormatWriter> {
        Box::new(Self::new(context))
    }

    fn to_record_batch(&self, records: &[Record]) -> Result<RecordBatch> {
        let columns = column_names(records);
        if columns.is_empty() {
            return Err(self
                .context
                .serialization_error(None, "batch has no fields to write"));
        }

        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays = Vec::with_capacity(columns.len());
        for column in columns {
            let kind = infer_kind(column, records)
                .map_err(|msg| self.context.serialization_error(Some(column), msg))?;
            fields.push(Field::new(column, kind.data_type(), true));
            arrays.push(build_array(column, kind, records));
        }

        let schema = Arc::new(Schema::new(fields));
        RecordBatch::try_new(schema, arrays)
            .map_err(|e| self.context.serialization_error(None, e.to_string()))
    }
}

impl FormatWriter for ParquetWriter {
    fn context(&self) -> &WriterContext {
        &self.context
    }

    fn extension(&self) -> &'static str {
        "parquet"
    }

    /// Null out empty mappings, then check every column has one type
    fn prepare(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        let records: Vec<Record> = records
            .into_iter()
            .map(|mut record| {
                for value in record.values_mut() {
                    if matches!(value, Value::Object(map) if map.is_empty()) {
                        *value = Value::Null;
                    }
                }
                record
            })
            .collect();

        for column in column_names(&records) {
            infer_kind(column, &records)
                .map_err(|msg| self.context.preparation_error(Some(column), msg))?;
        }
        Ok(records)
    }

    fn encode(&self, records: &[Record]) -> Result<Vec<u8>> {
        let batch = self.to_record_batch(records)?;
        let props = writer_properties(self.context.compression(), self.context.stream_name());

        let mut buffer = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))
            .map_err(|e| self.context.serialization_error(None, e.to_string()))?;
        writer
            .write(&batch)
            .map_err(|e| self.context.serialization_error(None, e.to_string()))?;
        writer
            .close()
            .map_err(|e| self.context.serialization_error(None, e.to_string()))?;

        tracing::debug!(
            stream = %self.context.stream_name(),
            rows = batch.num_rows(),
            columns = batch.num_columns(),
            bytes = buffer.len(),
            "Encoded parquet"
        );
        Ok(buffer)
    }
}

/// Single Arrow type for a column, or a message describing the conflict
fn infer_kind(column: &str, records: &[Record]) -> std::result::Result<ColumnKind, String> {
    let mut kind: Option<ColumnKind> = None;
    for value in records.iter().filter_map(|r| r.get(column)) {
        let Some(seen) = ColumnKind::of(value) else {
            continue;
        };
        kind = match kind {
            None => Some(seen),
            Some(current) => Some(current.merge(seen).ok_or_else(|| {
                format!(
                    "column mixes {} and {} values",
                    current.name(),
                    seen.name()
                )
            })?),
        };
    }
    Ok(kind.unwrap_or(ColumnKind::Utf8))
}

fn build_array(column: &str, kind: ColumnKind, records: &[Record]) -> ArrayRef {
    let values = records.iter().map(|record| record.get(column));
    match kind {
        ColumnKind::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(records.len());
            for value in values {
                builder.append_option(value.and_then(Value::as_bool));
            }
            Arc::new(builder.finish())
        }
        ColumnKind::Int64 => {
            let mut builder = Int64Builder::with_capacity(records.len());
            for value in values {
                builder.append_option(value.and_then(Value::as_i64));
            }
            Arc::new(builder.finish())
        }
        ColumnKind::Float64 => {
            let mut builder = Float64Builder::with_capacity(records.len());
            for value in values {
                builder.append_option(value.and_then(Value::as_f64));
            }
            Arc::new(builder.finish())
        }
        ColumnKind::Utf8 => {
            let mut builder = StringBuilder::new();
            for value in values {
                builder.append_option(value.and_then(Value::as_str));
            }
            Arc::new(builder.finish())
        }
        ColumnKind::Json => {
            let mut builder = StringBuilder::new();
            for value in values {
                match value {
                    Some(nested @ (Value::Array(_) | Value::Object(_))) => {
                        builder.append_value(to_json_text(nested))
                    }
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WriterError;
    use crate::test_support::{context, memory_storage, read_object, records, sink_config};
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{Float64Type, Int64Type};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use serde_json::json;

    fn writer() -> (ParquetWriter, crate::StorageClient) {
        let storage = memory_storage();
        let writer = ParquetWriter::new(context(&sink_config("parquet"), &storage));
        (writer, storage)
    }

    #[test]
    fn test_kind_merge() {
        use ColumnKind::*;
        assert_eq!(Int64.merge(Float64), Some(Float64));
        assert_eq!(Utf8.merge(Utf8), Some(Utf8));
        assert_eq!(Utf8.merge(Int64), None);
        assert_eq!(Json.merge(Utf8), None);
    }

    #[test]
    fn test_prepare_nulls_empty_mappings() {
        let (writer, _) = writer();
        let prepared = writer
            .prepare(records(json!([{"a": {}, "b": {"c": 1}}])))
            .unwrap();
        assert_eq!(prepared[0].get("a"), Some(&Value::Null));
        assert_eq!(prepared[0].get("b"), Some(&json!({"c": 1})));
    }

    #[test]
    fn test_schema_is_union_of_fields() {
        let (writer, _) = writer();
        let batch = writer
            .to_record_batch(&records(json!([
                {"id": 1, "score": 1},
                {"id": 2, "score": 2.5, "name": "b", "tags": ["x"]},
                {"id": 3, "gone": null}
            ])))
            .unwrap();

        let schema = batch.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["gone", "id", "name", "score", "tags"]);
        assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(1).data_type(), &DataType::Int64);
        assert_eq!(schema.field(3).data_type(), &DataType::Float64);
        assert_eq!(schema.field(4).data_type(), &DataType::Utf8);

        let score = batch.column(3).as_primitive::<Float64Type>();
        assert_eq!(score.value(0), 1.0);
        assert!(score.is_null(2));

        let tags = batch.column(4).as_string::<i32>();
        assert_eq!(tags.value(1), "[\"x\"]");
    }

    #[test]
    fn test_conflicting_types_name_the_field() {
        let (writer, _) = writer();
        let err = writer
            .to_record_batch(&records(json!([{"age": 1}, {"age": "old"}])))
            .unwrap_err();
        match err {
            WriterError::Serialization { field, stream, .. } => {
                assert_eq!(field.as_deref(), Some("age"));
                assert_eq!(stream, "users");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_conflict_is_reported_while_preparing() {
        let (writer, _) = writer();
        let err = writer
            .prepare(records(json!([{"ok": true}, {"ok": 1.5}])))
            .unwrap_err();
        assert_eq!(err.phase(), crate::Phase::Prepare);
        assert!(err.to_string().contains("boolean and float"));
    }

    #[test]
    fn test_batch_without_fields_fails() {
        let (writer, _) = writer();
        let err = writer.to_record_batch(&records(json!([{}, {}]))).unwrap_err();
        assert!(matches!(err, WriterError::Serialization { .. }));
    }

    #[tokio::test]
    async fn test_written_object_reads_back() {
        let (writer, storage) = writer();
        let receipt = writer
            .run(records(json!([{"id": 1, "meta": {}}, {"id": 2}])))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(receipt.key, "p/users/2024/01/15/20240115-14.parquet.gz");

        let body = bytes::Bytes::from(read_object(&storage, &receipt.key).await);
        let reader = ParquetRecordBatchReaderBuilder::try_new(body)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 1);

        let batch = &batches[0];
        assert_eq!(batch.num_rows(), 2);
        let ids = batch.column(0).as_primitive::<Int64Type>();
        assert_eq!(ids.values().to_vec(), vec![1, 2]);
        assert_eq!(batch.column(1).null_count(), 2);
    }
}
