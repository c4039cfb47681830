// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::*;
use anyhow::{bail, Result};
use records2s3_core::DateGrain;
use tracing::warn;

pub fn validate_config(config: &SinkConfig) -> Result<()> {
    validate_destination(config)?;
    validate_partitioning(config)?;
    validate_storage(config)?;
    validate_batch_config(&config.batch)?;
    Ok(())
}

fn validate_destination(config: &SinkConfig) -> Result<()> {
    if config.bucket.is_empty() {
        bail!("bucket is required");
    }

    if config.prefix.is_empty() {
        bail!("prefix is required");
    }

    if config.format_type.is_empty() {
        bail!("format_type is required");
    }

    if config.prefix.ends_with('/') {
        warn!(
            prefix = %config.prefix,
            "prefix ends with '/'; keys will contain an empty path segment"
        );
    }

    Ok(())
}

fn validate_partitioning(config: &SinkConfig) -> Result<()> {
    if config.append_date_to_prefix {
        config
            .append_date_to_prefix_grain
            .parse::<DateGrain>()
            .map_err(|e| anyhow::anyhow!("append_date_to_prefix_grain: {}", e))?;
    }

    if config.append_date_to_filename {
        config
            .append_date_to_filename_grain
            .parse::<DateGrain>()
            .map_err(|e| anyhow::anyhow!("append_date_to_filename_grain: {}", e))?;
    }

    Ok(())
}

fn validate_storage(config: &SinkConfig) -> Result<()> {
    match config.storage_backend {
        StorageBackend::S3 => {
            if config.aws.aws_region.as_deref().unwrap_or_default().is_empty() {
                bail!("aws_region is required for the s3 storage backend");
            }

            if config.aws.aws_access_key.is_some() != config.aws.aws_secret_access_key.is_some() {
                bail!("aws_access_key and aws_secret_access_key must be set together");
            }

            if config.aws.has_static_credentials() && config.aws.aws_profile.is_some() {
                warn!("Both static credentials and aws_profile are set; static credentials win");
            }
        }
        StorageBackend::Fs => {
            if config.storage_path.as_deref().unwrap_or_default().is_empty() {
                bail!("storage_path is required for the fs storage backend");
            }
        }
    }

    Ok(())
}

fn validate_batch_config(config: &BatchConfig) -> Result<()> {
    if config.max_rows == 0 {
        bail!("batch.max_rows must be greater than 0");
    }

    // Warn about very large batch sizes
    if config.max_rows > 10_000_000 {
        warn!(
            max_rows = config.max_rows,
            "batch.max_rows is very large; may cause memory issues"
        );
    }

    Ok(())
}
