// records2s3-config - Sink configuration
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from --config or RECORDS2S3_CONFIG
// 3. Config file contents from RECORDS2S3_CONFIG_CONTENT
// 4. Default config file location (./records2s3.toml)
// 5. Built-in defaults (lowest priority)

use anyhow::Result;
use records2s3_core::{FlattenOptions, PartitionConfig, Preprocessor};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{apply_env_overrides, EnvSource, ENV_PREFIX};

/// Main sink configuration
///
/// Option names match the keys Singer S3 targets accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub bucket: String,

    #[serde(default)]
    pub prefix: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_name_path_override: Option<String>,

    #[serde(default = "default_true")]
    pub append_date_to_prefix: bool,

    #[serde(default = "default_grain")]
    pub append_date_to_prefix_grain: String,

    #[serde(default = "default_true")]
    pub append_date_to_filename: bool,

    #[serde(default = "default_grain")]
    pub append_date_to_filename_grain: String,

    #[serde(default)]
    pub include_process_date: bool,

    #[serde(default)]
    pub flatten_records: bool,

    #[serde(default)]
    pub format_type: String,

    #[serde(default)]
    pub compression: Compression,

    #[serde(flatten)]
    pub aws: AwsConfig,

    #[serde(default)]
    pub storage_backend: StorageBackend,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,

    /// Probe the object store once at startup
    #[serde(default = "default_true")]
    pub verify_connection: bool,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub log: LogConfig,
}

fn default_true() -> bool {
    true
}

fn default_grain() -> String {
    "day".to_string()
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: String::new(),
            stream_name_path_override: None,
            append_date_to_prefix: true,
            append_date_to_prefix_grain: default_grain(),
            append_date_to_filename: true,
            append_date_to_filename_grain: default_grain(),
            include_process_date: false,
            flatten_records: false,
            format_type: String::new(),
            compression: Compression::default(),
            aws: AwsConfig::default(),
            storage_backend: StorageBackend::default(),
            storage_path: None,
            verify_connection: true,
            batch: BatchConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// Credentials and endpoint consumed only by the object-store client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_access_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_secret_access_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_session_token: Option<String>,

    #[serde(
        default,
        alias = "aws_profile_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub aws_profile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    /// Static key pair is configured (session token optional)
    pub fn has_static_credentials(&self) -> bool {
        self.aws_access_key.is_some() && self.aws_secret_access_key.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    S3,
    Fs,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::S3 => write!(f, "s3"),
            StorageBackend::Fs => write!(f, "fs"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "s3" | "aws" => Ok(StorageBackend::S3),
            "fs" | "filesystem" => Ok(StorageBackend::Fs),
            _ => anyhow::bail!("Unsupported storage backend: {}. Supported: s3, fs", s),
        }
    }
}

/// Compression applied to every object written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Gzip,
    Zstd,
}

impl Compression {
    /// Object key suffix for this codec
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::Gzip => "gz",
            Compression::Zstd => "zst",
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::Gzip => write!(f, "gzip"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gzip" | "gz" => Ok(Compression::Gzip),
            "zstd" | "zst" => Ok(Compression::Zstd),
            _ => anyhow::bail!("Unsupported compression: {}. Supported: gzip, zstd", s),
        }
    }
}

/// Batch configuration for the sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub max_rows: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_rows: 10_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl SinkConfig {
    /// Load configuration from the default sources
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration from an explicit file, then apply env overrides
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Parse configuration from TOML text without env overrides
    pub fn from_toml(content: &str) -> Result<Self> {
        sources::parse_toml(content)
    }

    /// Apply environment overrides from a custom source
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Partitioning settings for the key builder
    pub fn partition_config(&self) -> records2s3_core::Result<PartitionConfig> {
        PartitionConfig::from_options(
            self.prefix.clone(),
            self.stream_name_path_override.clone(),
            self.append_date_to_prefix,
            &self.append_date_to_prefix_grain,
            self.append_date_to_filename,
            &self.append_date_to_filename_grain,
        )
    }

    /// Record transforms enabled by this configuration
    pub fn preprocessor(&self) -> Preprocessor {
        let flatten = self.flatten_records.then(FlattenOptions::default);
        Preprocessor::new(self.include_process_date, flatten)
    }
}
