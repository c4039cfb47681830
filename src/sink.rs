//! Stream buffering and batch flushing
//!
//! Records are buffered per stream. A stream is flushed as one batch when it
//! reaches `batch.max_rows`, when its schema changes, and at end of input.
//! The latest STATE message is emitted only after every buffer has been
//! written.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDateTime, Utc};
use records2s3_config::SinkConfig;
use records2s3_core::{BatchContext, Record};
use records2s3_writer::{create_writer, FormatRegistry, StorageClient, WriteReceipt};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::message::{parse_line, Message};

pub type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

#[derive(Debug, Default)]
struct StreamBuffer {
    schema: Value,
    records: Vec<Record>,
    batch_start: Option<NaiveDateTime>,
}

/// Totals for one sink run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkSummary {
    pub batches: usize,
    pub records: usize,
    pub keys: Vec<String>,
}

impl SinkSummary {
    fn add(&mut self, receipt: WriteReceipt) {
        self.batches += 1;
        self.records += receipt.records;
        self.keys.push(receipt.key);
    }
}

pub struct Sink {
    config: SinkConfig,
    registry: FormatRegistry,
    storage: StorageClient,
    clock: Clock,
    streams: BTreeMap<String, StreamBuffer>,
    pending_state: Option<Value>,
    /// Object keys uploaded during this run
    written: HashSet<String>,
    summary: SinkSummary,
}

impl Sink {
    /// Fails when `format_type` is not registered, before any input is read
    pub fn new(
        config: SinkConfig,
        registry: FormatRegistry,
        storage: StorageClient,
    ) -> Result<Self> {
        registry.ensure_registered(&config.format_type)?;
        Ok(Self {
            config,
            registry,
            storage,
            clock: Box::new(|| Utc::now().naive_utc()),
            streams: BTreeMap::new(),
            pending_state: None,
            written: HashSet::new(),
            summary: SinkSummary::default(),
        })
    }

    /// Replace the source of batch start timestamps
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Consume every message from `input`, then flush and emit the final STATE
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> Result<SinkSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await.context("Failed to read input")? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let message =
                parse_line(&line).with_context(|| format!("Invalid message on line {}", line_no))?;
            self.process(message).await?;
        }

        self.drain().await?;

        if let Some(state) = self.pending_state.take() {
            emit_state(&mut output, state).await?;
        }

        info!(
            batches = self.summary.batches,
            records = self.summary.records,
            "Sink finished"
        );
        Ok(self.summary.clone())
    }

    async fn process(&mut self, message: Message) -> Result<()> {
        match message {
            Message::Schema { stream, schema, .. } => {
                let changed = matches!(
                    self.streams.get(&stream),
                    Some(buffer) if buffer.schema != schema
                );
                if changed {
                    debug!(stream = %stream, "Schema changed, flushing buffered records");
                    self.flush(&stream).await?;
                }
                self.streams.entry(stream).or_default().schema = schema;
            }
            Message::Record { stream, record, .. } => {
                let Some(buffer) = self.streams.get_mut(&stream) else {
                    bail!("RECORD for stream '{}' arrived before its SCHEMA", stream);
                };
                if buffer.batch_start.is_none() {
                    buffer.batch_start = Some((self.clock)());
                }
                buffer.records.push(record);

                let full = buffer.records.len() >= self.config.batch.max_rows;
                if full {
                    self.flush(&stream).await?;
                }
            }
            Message::State { value } => {
                self.pending_state = Some(value);
            }
            Message::ActivateVersion { stream, version } => {
                warn!(stream = %stream, version, "ACTIVATE_VERSION is not supported, ignoring");
            }
        }
        Ok(())
    }

    /// Write the buffered records of one stream as a single batch
    ///
    /// A batch never replaces an object written earlier in the same run.
    async fn flush(&mut self, stream: &str) -> Result<()> {
        let Some(buffer) = self.streams.get_mut(stream) else {
            return Ok(());
        };
        let records = std::mem::take(&mut buffer.records);
        let Some(batch_start) = buffer.batch_start.take() else {
            return Ok(());
        };

        let batch = BatchContext::new(stream, batch_start)?;
        let writer = create_writer(&self.registry, &self.config, &batch, self.storage.clone())?;

        let object_key = writer.context().object_key(writer.extension());
        if self.written.contains(&object_key) {
            bail!(
                "Batch for stream '{}' would overwrite '{}' written earlier in this run; \
                 use a finer append_date_to_filename_grain or a larger batch.max_rows",
                stream,
                object_key
            );
        }

        let receipt = writer
            .run(records)
            .await
            .with_context(|| format!("Failed to write batch for stream '{}'", stream))?;

        if let Some(receipt) = receipt {
            self.written.insert(receipt.key.clone());
            self.summary.add(receipt);
        }
        Ok(())
    }

    async fn drain(&mut self) -> Result<()> {
        let streams: Vec<String> = self.streams.keys().cloned().collect();
        for stream in streams {
            self.flush(&stream).await?;
        }
        Ok(())
    }
}

async fn emit_state<W: AsyncWrite + Unpin>(output: &mut W, value: Value) -> Result<()> {
    let line = serde_json::to_string(&json!({"type": "STATE", "value": value}))?;
    debug!(state = %line, "Emitting state");
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await.context("Failed to write STATE")?;
    Ok(())
}
