use records2s3_core::Record;

use crate::context::WriterContext;
use crate::error::Result;
use crate::format::FormatWriter;

/// The whole batch as a single JSON array
#[derive(Debug, Clone)]
pub struct JsonWriter {
    context: WriterContext,
}

impl JsonWriter {
    pub fn new(context: WriterContext) -> Self {
        Self { context }
    }

    pub(crate) fn boxed(context: WriterContext) -> Box<dyn FormatWriter> {
        Box::new(Self::new(context))
    }
}

impl FormatWriter for JsonWriter {
    fn context(&self) -> &WriterContext {
        &self.context
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn encode(&self, records: &[Record]) -> Result<Vec<u8>> {
        let raw = serde_json::to_vec(records)
            .map_err(|e| self.context.serialization_error(None, e.to_string()))?;
        self.context.compress(&raw)
    }
}
