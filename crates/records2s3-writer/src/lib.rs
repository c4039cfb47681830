//! Format writers for records2s3
//!
//! A format writer takes one batch of records for one stream, runs the shared
//! preprocessing, serializes the batch into its encoding and uploads a single
//! object to the configured store. New encodings plug in through
//! [`FormatRegistry`] without touching the rest of the pipeline.

// Allow large error types - rich diagnostic messages are more valuable on error paths.
#![allow(clippy::result_large_err)]

mod compression;
mod context;
mod encoding;
mod error;
pub mod format;
mod registry;
mod storage;

pub use context::{WriteReceipt, WriterContext};
pub use error::{ErrorCode, Phase, Result, WriterError};
pub use format::FormatWriter;
pub use registry::{create_writer, FormatRegistry, WriterConstructor};
pub use storage::StorageClient;

pub use records2s3_config::Compression;
pub use records2s3_core::{BatchContext, Record};
