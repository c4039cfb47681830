use anyhow::{Context, Result};
use clap::Parser;
use records2s3_config::SinkConfig;
use std::path::PathBuf;
use tracing::info;

/// Singer target writing record streams to object storage
#[derive(Parser)]
#[command(name = "records2s3")]
#[command(version)]
#[command(about = "Write Singer record streams to S3 as Parquet, CSV or JSON", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Read messages from a file instead of stdin
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let mut config = if let Some(config_path) = &cli.config {
        SinkConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        SinkConfig::load().context("Failed to load configuration")?
    };

    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }

    records2s3::init_tracing(&config);
    display_startup_info(&config);

    let summary = records2s3::run_with_config(config, cli.input.as_deref()).await?;
    info!(
        "Wrote {} records in {} batches",
        summary.records, summary.batches
    );
    Ok(())
}

fn display_startup_info(config: &SinkConfig) {
    info!("records2s3 v{}", env!("CARGO_PKG_VERSION"));
    info!("Format: {} ({})", config.format_type, config.compression);
    info!("Destination: {}/{}", config.bucket, config.prefix);
    if let Some(stream) = &config.stream_name_path_override {
        info!("Stream path override: {}", stream);
    }
    info!(
        "Partitioning: folders={} ({}), filename={} ({})",
        config.append_date_to_prefix,
        config.append_date_to_prefix_grain,
        config.append_date_to_filename,
        config.append_date_to_filename_grain
    );
    info!(
        "Flatten records: {}, process date: {}",
        config.flatten_records, config.include_process_date
    );
    info!("Batch max rows: {}", config.batch.max_rows);
}
