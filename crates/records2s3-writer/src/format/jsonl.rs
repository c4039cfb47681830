use records2s3_core::Record;

use crate::context::WriterContext;
use crate::error::Result;
use crate::format::FormatWriter;

/// Newline-delimited JSON, one record per line
#[derive(Debug, Clone)]
pub struct JsonLinesWriter {
    context: WriterContext,
}

impl JsonLinesWriter {
    pub fn new(context: WriterContext) -> Self {
        Self { context }
    }

    pub(crate) fn boxed(context: WriterContext) -> Box<dyn FormatWriter> {
        Box::new(Self::new(context))
    }
}

impl FormatWriter for JsonLinesWriter {
    fn context(&self) -> &WriterContext {
        &self.context
    }

    fn extension(&self) -> &'static str {
        "jsonl"
    }

    fn encode(&self, records: &[Record]) -> Result<Vec<u8>> {
        let mut raw = Vec::new();
        for record in records {
            serde_json::to_writer(&mut raw, record)
                .map_err(|e| self.context.serialization_error(None, e.to_string()))?;
            raw.push(b'\n');
        }
        self.context.compress(&raw)
    }
}
