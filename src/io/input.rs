// file: src/io/input.rs
// description: line delimited json source over any async buffered reader

use super::RecordSource;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Reads one JSON document per line. Blank lines are skipped.
pub struct LineSource<R> {
    lines: Lines<R>,
    line_number: u64,
}

impl<R: AsyncBufRead + Unpin + Send> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

impl LineSource<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> RecordSource for LineSource<R> {
    async fn next(&mut self, cancel: &CancellationToken) -> Result<Option<Value>> {
        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                line = self.lines.next_line() => line?,
            };

            let Some(line) = line else {
                return Ok(None);
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            trace!(line = self.line_number, "decoding input line");
            return serde_json::from_str(&line)
                .map(Some)
                .map_err(|source| PipelineError::Decode {
                    line: self.line_number,
                    source,
                });
        }
    }
}

/// In-memory source, mostly useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySource {
    items: VecDeque<Result<Value>>,
}

impl MemorySource {
    pub fn new(records: impl IntoIterator<Item = Value>) -> Self {
        Self {
            items: records.into_iter().map(Ok).collect(),
        }
    }

    /// Queues a failure that `next` returns once the preceding records are read.
    pub fn with_failure(mut self, error: PipelineError) -> Self {
        self.items.push_back(Err(error));
        self
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn next(&mut self, cancel: &CancellationToken) -> Result<Option<Value>> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        self.items.pop_front().transpose()
    }
}
