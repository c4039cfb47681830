//! Error types for the core crate

use thiserror::Error;

/// Errors raised while interpreting partitioning configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Grain string is not one of the supported calendar units
    #[error("Unsupported date grain '{0}'. Supported: year, month, day, hour, minute, second, microsecond")]
    UnknownGrain(String),

    /// Stream identity is required to build a storage key
    #[error("Stream name must not be empty")]
    EmptyStreamName,
}

pub type Result<T> = std::result::Result<T, CoreError>;
