// file: src/io/mod.rs
// description: record source and sink contracts plus stdin/stdout adapters
// reference: internal module structure

mod input;
mod output;

pub use input::{LineSource, MemorySource};
pub use output::JsonLinesSink;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Where records come from.
#[async_trait]
pub trait RecordSource: Send {
    /// Returns the next record, or `Ok(None)` once no record is left.
    async fn next(&mut self, cancel: &CancellationToken) -> Result<Option<Value>>;
}

/// Where records end up.
#[async_trait]
pub trait RecordSink: Send {
    /// Adds a record to the pending output.
    fn append(&mut self, record: Value);

    /// Writes every appended record to the target. Called once after the
    /// pipeline fully drains.
    async fn write(&mut self) -> Result<()>;
}
