use csv::WriterBuilder;
use records2s3_core::{flatten::to_json_text, Record};
use serde_json::Value;

use crate::context::WriterContext;
use crate::error::Result;
use crate::format::{column_names, FormatWriter};

/// Delimited text with a header row
///
/// The header is the sorted union of field names across the batch; records
/// missing a field get an empty cell. Nested values are written as JSON text.
#[derive(Debug, Clone)]
pub struct CsvWriter {
    context: WriterContext,
}

impl CsvWriter {
    pub fn new(context: WriterContext) -> Self {
        Self { context }
    }

    pub(crate) fn boxed(context: WriterContext) -> Box<dyn FormatWriter> {
        Box::new(Self::new(context))
    }
}

impl FormatWriter for CsvWriter {
    fn context(&self) -> &WriterContext {
        &self.context
    }

    fn extension(&self) -> &'static str {
        "csv"
    }

    fn encode(&self, records: &[Record]) -> Result<Vec<u8>> {
        let columns = column_names(records);
        let mut wtr = WriterBuilder::new().from_writer(Vec::new());

        wtr.write_record(&columns)
            .map_err(|e| self.context.serialization_error(None, e.to_string()))?;

        for record in records {
            let row = columns.iter().map(|column| cell(record.get(*column)));
            wtr.write_record(row)
                .map_err(|e| self.context.serialization_error(None, e.to_string()))?;
        }

        let raw = wtr
            .into_inner()
            .map_err(|e| self.context.serialization_error(None, e.to_string()))?;
        self.context.compress(&raw)
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(nested) => to_json_text(nested),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context, memory_storage, read_object, records, sink_config};
    use serde_json::json;
    use std::io::Read;

    #[test]
    fn test_cells() {
        assert_eq!(cell(None), "");
        assert_eq!(cell(Some(&Value::Null)), "");
        assert_eq!(cell(Some(&json!(1.5))), "1.5");
        assert_eq!(cell(Some(&json!({"a": [1, 2]}))), "{\"a\": [1, 2]}");
    }

    #[tokio::test]
    async fn test_header_is_union_and_missing_cells_are_empty() {
        let storage = memory_storage();
        let writer = CsvWriter::new(context(&sink_config("csv"), &storage));

        let receipt = writer
            .run(records(json!([
                {"name": "a, b", "id": 1},
                {"id": 2, "active": true}
            ])))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(receipt.key, "p/users/2024/01/15/20240115-14.csv.gz");

        let body = read_object(&storage, &receipt.key).await;
        let mut text = String::new();
        flate2::read::GzDecoder::new(body.as_slice())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "active,id,name\n,1,\"a, b\"\ntrue,2,\n");
    }
}
