//! The format writer contract and its built-in variants
//!
//! Every variant follows the same lifecycle:
//! 1. shared preprocessing (process date, flattening) from the context
//! 2. variant-specific [`FormatWriter::prepare`]; a batch whose records carry
//!    no fields at all is rejected here for every format
//! 3. [`FormatWriter::encode`] into a complete compressed body
//! 4. a single upload to `<key>.<extension>.<compression>`

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::context::{WriteReceipt, WriterContext};
use crate::error::Result;
use records2s3_core::Record;

mod csv;
mod json;
mod jsonl;
mod parquet;

pub use self::csv::CsvWriter;
pub use self::json::JsonWriter;
pub use self::jsonl::JsonLinesWriter;
pub use self::parquet::ParquetWriter;

#[async_trait]
pub trait FormatWriter: Send + Sync {
    fn context(&self) -> &WriterContext;

    /// Format extension placed before the compression suffix, e.g. `csv`
    fn extension(&self) -> &'static str;

    /// Variant-specific preparation, run after the shared preprocessing
    fn prepare(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        Ok(records)
    }

    /// Encode prepared records into the final object body
    fn encode(&self, records: &[Record]) -> Result<Vec<u8>>;

    /// Encode and upload already prepared records as one object
    async fn write(&self, records: Vec<Record>) -> Result<WriteReceipt> {
        let body = self.encode(&records)?;
        self.context()
            .upload(self.extension(), body, records.len())
            .await
    }

    /// Prepare and write one batch; an empty batch writes nothing
    ///
    /// Implementations must not override this method. It owns the shared
    /// preprocessing that precedes [`FormatWriter::prepare`].
    async fn run(&self, records: Vec<Record>) -> Result<Option<WriteReceipt>> {
        if records.is_empty() {
            tracing::debug!(
                stream = %self.context().stream_name(),
                "Empty batch, nothing to write"
            );
            return Ok(None);
        }

        let prepared = prepare_batch(self, &records)?;
        drop(records);
        self.write(prepared).await.map(Some)
    }
}

/// Shared preprocessing followed by the variant's own preparation
pub(crate) fn prepare_batch<W>(writer: &W, records: &[Record]) -> Result<Vec<Record>>
where
    W: FormatWriter + ?Sized,
{
    let shared = writer.context().preprocessor().apply(records);
    let prepared = writer.prepare(shared)?;
    if column_names(&prepared).is_empty() {
        return Err(writer
            .context()
            .preparation_error(None, "batch has no fields to write"));
    }
    Ok(prepared)
}

/// Sorted union of field names across a batch
pub(crate) fn column_names(records: &[Record]) -> Vec<&str> {
    records
        .iter()
        .flat_map(|record| record.keys().map(String::as_str))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
