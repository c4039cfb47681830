use records2s3_config::{Compression, SinkConfig};
use records2s3_core::{build_key, BatchContext, Preprocessor};

use crate::compression::compress;
use crate::error::{Result, WriterError};
use crate::storage::StorageClient;

/// Everything a writer needs for one batch of one stream
///
/// The storage key is computed once here, so every object written through this
/// context shares the same base key.
#[derive(Debug, Clone)]
pub struct WriterContext {
    stream_name: String,
    key: String,
    preprocessor: Preprocessor,
    compression: Compression,
    storage: StorageClient,
}

/// Result of one successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    pub stream_name: String,
    pub key: String,
    pub records: usize,
    pub bytes: usize,
    /// Format extension, e.g. `parquet`
    pub format: &'static str,
    pub compression: Compression,
}

impl WriterContext {
    pub fn new(config: &SinkConfig, batch: &BatchContext, storage: StorageClient) -> Result<Self> {
        if batch.stream_name.is_empty() {
            return Err(WriterError::configuration("stream name must not be empty"));
        }
        if config.prefix.is_empty() {
            return Err(WriterError::configuration("prefix is required"));
        }

        let partition = config
            .partition_config()
            .map_err(|e| WriterError::configuration(e.to_string()))?;
        let key = build_key(&batch.stream_name, batch.batch_start, &partition);

        tracing::info!(stream = %batch.stream_name, key = %key, "Computed storage key");

        Ok(Self {
            stream_name: batch.stream_name.clone(),
            key,
            preprocessor: config.preprocessor(),
            compression: config.compression,
            storage,
        })
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Base key without format or compression suffix
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn storage(&self) -> &StorageClient {
        &self.storage
    }

    /// `<key>.<extension>.<compression extension>`
    pub fn object_key(&self, extension: &str) -> String {
        format!("{}.{}.{}", self.key, extension, self.compression.extension())
    }

    /// Compress a fully encoded body with the configured codec
    pub(crate) fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        compress(self.compression, raw).map_err(|e| {
            WriterError::serialization(
                self.stream_name.as_str(),
                None,
                format!("{} compression failed: {}", self.compression, e),
            )
        })
    }

    pub(crate) fn serialization_error(
        &self,
        field: Option<&str>,
        message: impl Into<String>,
    ) -> WriterError {
        WriterError::serialization(self.stream_name.as_str(), field.map(str::to_string), message)
    }

    pub(crate) fn preparation_error(
        &self,
        field: Option<&str>,
        message: impl Into<String>,
    ) -> WriterError {
        WriterError::preparation(self.stream_name.as_str(), field.map(str::to_string), message)
    }

    pub(crate) async fn upload(
        &self,
        extension: &'static str,
        body: Vec<u8>,
        records: usize,
    ) -> Result<WriteReceipt> {
        let key = self.object_key(extension);
        let bytes = body.len();

        tracing::debug!(
            bucket = %self.storage.bucket(),
            key = %key,
            bytes,
            "Uploading object"
        );

        self.storage
            .put(&key, body)
            .await
            .map_err(|e| {
                WriterError::write(self.stream_name.as_str(), key.as_str(), e.to_string())
            })?;

        tracing::info!(
            stream = %self.stream_name,
            key = %key,
            records,
            bytes,
            "Wrote batch"
        );

        Ok(WriteReceipt {
            stream_name: self.stream_name.clone(),
            key,
            records,
            bytes,
            format: extension,
            compression: self.compression,
        })
    }
}
