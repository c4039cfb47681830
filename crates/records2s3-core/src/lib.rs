// records2s3-core - Platform-agnostic record normalization
//
// This crate contains the PURE logic shared by every format writer:
// storage key generation, record flattening and batch preprocessing.
// No I/O, no async, no runtime dependencies.

pub mod error;
pub mod flatten;
pub mod partition;
pub mod preprocess;

pub use error::{CoreError, Result};
pub use flatten::{flatten_key, flatten_record, FlattenOptions};
pub use partition::{build_key, BatchContext, DateGrain, PartitionConfig};
pub use preprocess::{Preprocessor, PROCESS_DATE_FIELD};

/// A single record: field name to dynamically typed value, insertion ordered.
pub type Record = serde_json::Map<String, serde_json::Value>;
