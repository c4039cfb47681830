// records2s3 - Singer target writing record streams to object storage
//
// Reads RECORD / SCHEMA / STATE lines, buffers records per stream and hands
// each batch to the configured format writer.

use anyhow::{Context, Result};
use records2s3_config::SinkConfig;
use records2s3_writer::FormatRegistry;
use std::path::Path;
use tokio::io::BufReader;

mod init;
pub mod message;
pub mod sink;

pub use init::{init_storage, init_tracing};
pub use sink::{Clock, Sink, SinkSummary};

/// Run the sink over a file, or stdin when `input` is `None`
///
/// The format is resolved before storage is touched or input is read.
pub async fn run_with_config(config: SinkConfig, input: Option<&Path>) -> Result<SinkSummary> {
    let registry = FormatRegistry::builtin();
    registry.ensure_registered(&config.format_type)?;

    let storage = init_storage(&config).await?;
    let mut sink = Sink::new(config, registry, storage)?;
    let stdout = tokio::io::stdout();

    match input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input file: {}", path.display()))?;
            sink.run(BufReader::new(file), stdout).await
        }
        None => sink.run(BufReader::new(tokio::io::stdin()), stdout).await,
    }
}
