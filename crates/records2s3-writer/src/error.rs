//! Error types for the format writers

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Configuration missing or invalid
    E001InvalidConfig,
    /// E002: Credentials rejected or could not be resolved
    E002InvalidCredentials,
    /// E003: Batch could not be encoded
    E003SerializationFailure,
    /// E004: Upload to the object store failed
    E004WriteFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001InvalidConfig => "E001",
            Self::E002InvalidCredentials => "E002",
            Self::E003SerializationFailure => "E003",
            Self::E004WriteFailure => "E004",
        }
    }
}

/// Stage of the writer lifecycle an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Writer or storage client construction
    Construct,
    /// Variant-specific record preparation
    Prepare,
    /// Encoding prepared records
    Serialize,
    /// Uploading the encoded object
    Write,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Construct => write!(f, "construct"),
            Phase::Prepare => write!(f, "prepare"),
            Phase::Serialize => write!(f, "serialize"),
            Phase::Write => write!(f, "write"),
        }
    }
}

#[derive(Debug, Error)]
pub enum WriterError {
    /// Configuration is incomplete, inconsistent or names an unknown format
    #[error("[{code}] Invalid configuration: {message}")]
    Configuration { code: &'static str, message: String },

    /// Credentials rejected or unresolvable
    #[error("[{code}] Authentication failed: {message}")]
    Authentication { code: &'static str, message: String },

    /// A batch could not be prepared or encoded
    #[error(
        "[{code}] Failed to serialize stream '{stream}' (field: {}): {message}",
        .field.as_deref().unwrap_or("-")
    )]
    Serialization {
        code: &'static str,
        stream: String,
        field: Option<String>,
        message: String,
        phase: Phase,
    },

    /// The encoded object could not be uploaded
    #[error("[{code}] Failed to write stream '{stream}' to '{key}': {message}")]
    Write {
        code: &'static str,
        stream: String,
        key: String,
        message: String,
    },
}

impl WriterError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            code: ErrorCode::E001InvalidConfig.as_str(),
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            code: ErrorCode::E002InvalidCredentials.as_str(),
            message: message.into(),
        }
    }

    /// Encoding failure, optionally attributed to a single field
    pub fn serialization(
        stream: impl Into<String>,
        field: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Serialization {
            code: ErrorCode::E003SerializationFailure.as_str(),
            stream: stream.into(),
            field,
            message: message.into(),
            phase: Phase::Serialize,
        }
    }

    /// Record shape rejected while preparing a batch for its encoder
    pub fn preparation(
        stream: impl Into<String>,
        field: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Serialization {
            code: ErrorCode::E003SerializationFailure.as_str(),
            stream: stream.into(),
            field,
            message: message.into(),
            phase: Phase::Prepare,
        }
    }

    pub fn write(
        stream: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Write {
            code: ErrorCode::E004WriteFailure.as_str(),
            stream: stream.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Configuration { .. } => ErrorCode::E001InvalidConfig,
            Self::Authentication { .. } => ErrorCode::E002InvalidCredentials,
            Self::Serialization { .. } => ErrorCode::E003SerializationFailure,
            Self::Write { .. } => ErrorCode::E004WriteFailure,
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            Self::Configuration { .. } | Self::Authentication { .. } => Phase::Construct,
            Self::Serialization { phase, .. } => *phase,
            Self::Write { .. } => Phase::Write,
        }
    }
}

/// Result type alias for WriterError
pub type Result<T> = std::result::Result<T, WriterError>;
