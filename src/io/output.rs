// file: src/io/output.rs
// description: buffered json sink flushed once to any async writer

use super::RecordSink;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tracing::debug;

/// Collects records and writes them newline separated on flush, without a
/// trailing newline.
pub struct JsonLinesSink<W> {
    writer: W,
    pretty: bool,
    records: Vec<Value>,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pretty: false,
            records: Vec::new(),
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    fn render(&self) -> Result<String> {
        let mut out = String::new();

        for (idx, record) in self.records.iter().enumerate() {
            if idx > 0 {
                out.push('\n');
            }

            let encoded = if self.pretty {
                serde_json::to_string_pretty(record)?
            } else {
                serde_json::to_string(record)?
            };
            out.push_str(&encoded);
        }

        Ok(out)
    }
}

impl JsonLinesSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> RecordSink for JsonLinesSink<W> {
    fn append(&mut self, record: Value) {
        self.records.push(record);
    }

    async fn write(&mut self) -> Result<()> {
        let rendered = self
            .render()
            .map_err(|e| PipelineError::Sink(e.to_string()))?;

        self.writer
            .write_all(rendered.as_bytes())
            .await
            .map_err(|e| PipelineError::Sink(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| PipelineError::Sink(e.to_string()))?;

        debug!(records = self.records.len(), "sink flushed");
        Ok(())
    }
}
