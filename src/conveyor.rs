// file: src/conveyor.rs
// description: bounded channel handoff between two adjacent pipeline stages
// reference: tokio mpsc bounded channels raced against a cancellation token

use crate::error::{PipelineError, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One stage's view of the chain: the receiving end of the previous edge and
/// the sending end of the next one.
///
/// The downstream receiver stays parked inside the conveyor until
/// [`Conveyor::chain_next`] hands it to the following stage. Each edge
/// therefore has exactly one producer and one consumer.
#[derive(Debug)]
pub struct Conveyor<T> {
    input: Option<mpsc::Receiver<T>>,
    output: Option<mpsc::Sender<T>>,
    downstream: Option<mpsc::Receiver<T>>,
    capacity: usize,
}

impl<T: Send> Conveyor<T> {
    pub fn new(input: mpsc::Receiver<T>, capacity: usize) -> Self {
        Self::build(Some(input), capacity)
    }

    /// Conveyor with no upstream. Used by the input stage, which only emits.
    pub fn head(capacity: usize) -> Self {
        Self::build(None, capacity)
    }

    fn build(input: Option<mpsc::Receiver<T>>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            input,
            output: Some(tx),
            downstream: Some(rx),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Waits for the next value. `Ok(None)` is end-of-stream.
    pub async fn accept(&mut self, cancel: &CancellationToken) -> Result<Option<T>> {
        let Some(input) = self.input.as_mut() else {
            return Ok(None);
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            item = input.recv() => Ok(item),
        }
    }

    /// Pushes a value downstream, waiting while the edge is full.
    pub async fn emit(&self, value: T, cancel: &CancellationToken) -> Result<()> {
        let output = self
            .output
            .as_ref()
            .ok_or(PipelineError::ConveyorClosed("emit after close"))?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            sent = output.send(value) => {
                sent.map_err(|_| PipelineError::ConveyorClosed("downstream stage is gone"))
            }
        }
    }

    /// Signals end-of-stream downstream. Later calls are no-ops.
    pub fn close(&mut self) {
        self.output.take();
    }

    pub fn is_closed(&self) -> bool {
        self.output.is_none()
    }

    /// Hands this conveyor's output to a new conveyor, chaining them in order.
    pub fn chain_next(&mut self) -> Result<Conveyor<T>> {
        let downstream = self
            .downstream
            .take()
            .ok_or(PipelineError::ConveyorClosed("output already chained"))?;
        Ok(Conveyor::new(downstream, self.capacity))
    }
}
