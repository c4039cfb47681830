//! Format-type registry
//!
//! Maps a `format_type` name to a constructor. Lookup is case-insensitive and
//! happens before any record is read, so an unknown name fails the run early.

use std::collections::BTreeMap;

use records2s3_config::SinkConfig;
use records2s3_core::BatchContext;

use crate::context::WriterContext;
use crate::error::{Result, WriterError};
use crate::format::{CsvWriter, FormatWriter, JsonLinesWriter, JsonWriter, ParquetWriter};
use crate::storage::StorageClient;

pub type WriterConstructor = fn(WriterContext) -> Box<dyn FormatWriter>;

#[derive(Clone, Default)]
pub struct FormatRegistry {
    constructors: BTreeMap<String, WriterConstructor>,
}

impl FormatRegistry {
    /// Registry without any formats
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every built-in format
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("parquet", ParquetWriter::boxed);
        registry.register("csv", CsvWriter::boxed);
        registry.register("jsonl", JsonLinesWriter::boxed);
        registry.register("ndjson", JsonLinesWriter::boxed);
        registry.register("json", JsonWriter::boxed);
        registry
    }

    /// Register or replace a format
    pub fn register(&mut self, name: &str, constructor: WriterConstructor) {
        self.constructors.insert(name.to_lowercase(), constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(&name.to_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    fn lookup(&self, name: &str) -> Result<WriterConstructor> {
        self.constructors
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| {
                WriterError::configuration(format!(
                    "format_type '{}' is not registered. Supported: {}",
                    name,
                    self.names().collect::<Vec<_>>().join(", ")
                ))
            })
    }

    /// Fail fast when `name` has no registered writer
    pub fn ensure_registered(&self, name: &str) -> Result<()> {
        self.lookup(name).map(|_| ())
    }

    pub fn create(&self, name: &str, context: WriterContext) -> Result<Box<dyn FormatWriter>> {
        let constructor = self.lookup(name)?;
        Ok(constructor(context))
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

/// Resolve the configured format and build its writer for one batch
///
/// The format lookup runs before the key is computed.
pub fn create_writer(
    registry: &FormatRegistry,
    config: &SinkConfig,
    batch: &BatchContext,
    storage: StorageClient,
) -> Result<Box<dyn FormatWriter>> {
    let constructor = registry.lookup(&config.format_type)?;
    let context = WriterContext::new(config, batch, storage)?;
    tracing::debug!(
        format = %config.format_type,
        stream = %batch.stream_name,
        "Created format writer"
    );
    Ok(constructor(context))
}
