// Process setup: logging and object storage

use anyhow::{Context, Result};
use records2s3_config::{LogFormat, SinkConfig, StorageBackend};
use records2s3_writer::StorageClient;
use tracing::info;

/// Connect the shared storage client
pub async fn init_storage(config: &SinkConfig) -> Result<StorageClient> {
    match config.storage_backend {
        StorageBackend::Fs => info!(
            "Using filesystem storage at: {}",
            config.storage_path.as_deref().unwrap_or_default()
        ),
        StorageBackend::S3 => info!(
            "Using S3 storage: bucket={}, region={}",
            config.bucket,
            config.aws.aws_region.as_deref().unwrap_or_default()
        ),
    }

    StorageClient::connect(config)
        .await
        .context("Failed to initialize storage")
}

/// Initialize tracing/logging from SinkConfig
///
/// Logs go to stderr; stdout carries STATE messages.
pub fn init_tracing(config: &SinkConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_new(&config.log.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Try to set the global subscriber; ignore error if already set (idempotent)
    let _ = match config.log.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_writer(std::io::stderr)),
        ),
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_writer(std::io::stderr)),
        ),
    };
}
