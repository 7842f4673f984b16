// file: src/pipeline/stage.rs
// description: the three kinds of stage workers run by the orchestrator
// reference: one tokio task per stage, each bound to one upstream and one downstream edge

use crate::conveyor::Conveyor;
use crate::error::{PipelineError, Result};
use crate::io::{RecordSink, RecordSource};
use crate::operation::{Outcome, SharedOperation};
use crate::pipeline::progress::ProgressTracker;
use crate::pipeline::report::{StageError, StageId};
use crate::record::{Envelope, Record};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handles every worker shares: the error channel, the cancellation token and
/// the run counters.
#[derive(Clone)]
pub(crate) struct StageContext {
    errors: mpsc::Sender<StageError>,
    cancel: CancellationToken,
    progress: Arc<ProgressTracker>,
}

impl StageContext {
    pub(crate) fn new(
        errors: mpsc::Sender<StageError>,
        cancel: CancellationToken,
        progress: Arc<ProgressTracker>,
    ) -> Self {
        Self {
            errors,
            cancel,
            progress,
        }
    }

    /// Hands an error to the orchestrator, waiting until it has room for it.
    async fn report(&self, stage: &StageId, sequence: Option<u64>, error: PipelineError) -> Result<()> {
        debug!(stage = %stage, sequence, error = %error, "stage reported error");
        let entry = StageError::new(stage.clone(), sequence, error);

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PipelineError::Cancelled),
            sent = self.errors.send(entry) => {
                sent.map_err(|_| PipelineError::ConveyorClosed("error collector is gone"))
            }
        }
    }
}

/// Pulls records from the source and emits them onto the first edge.
/// A source failure other than end-of-stream is reported and ends the stage.
pub(crate) async fn run_input<S: RecordSource>(
    mut source: S,
    mut conveyor: Conveyor<Envelope>,
    ctx: StageContext,
) {
    let stage = StageId::Input;
    debug!(stage = %stage, "stage started");

    let mut sequence = 0u64;
    loop {
        match source.next(&ctx.cancel).await {
            Ok(Some(payload)) => {
                ctx.progress.inc_read();

                if let Err(err) = conveyor.emit(Envelope::new(sequence, payload), &ctx.cancel).await {
                    // A closed edge never reopens: report it once and stop reading.
                    let terminal = err.is_conveyor_closed();
                    if err.is_cancelled() || ctx.report(&stage, Some(sequence), err).await.is_err() || terminal {
                        break;
                    }
                }
                sequence += 1;
            }
            Ok(None) => break,
            Err(err) if err.is_cancelled() => break,
            Err(err) => {
                let _ = ctx.report(&stage, Some(sequence), err).await;
                break;
            }
        }
    }

    conveyor.close();
    debug!(stage = %stage, records = sequence, "stage closed");
}

/// Applies one operation to every record on its edge. Record-level failures
/// are reported and the stage keeps running until upstream ends, or until
/// its downstream edge is gone.
pub(crate) async fn run_operation(
    stage: StageId,
    operation: SharedOperation,
    mut conveyor: Conveyor<Envelope>,
    ctx: StageContext,
) {
    debug!(stage = %stage, "stage started");

    loop {
        // accept only fails on cancellation.
        let Ok(Some(envelope)) = conveyor.accept(&ctx.cancel).await else {
            break;
        };

        let sequence = envelope.sequence;
        let applied = Record::try_from(envelope.payload)
            .and_then(|record| operation.apply(&ctx.cancel, record));

        // The flag marks failures of the downstream edge itself.
        let failure = match applied {
            Ok(Outcome::Skip) => {
                ctx.progress.inc_skipped();
                continue;
            }
            Ok(Outcome::Emit(record)) => conveyor
                .emit(Envelope::new(sequence, record.into_value()), &ctx.cancel)
                .await
                .err()
                .map(|err| (err, true)),
            Err(err) => Some((err, false)),
        };

        if let Some((err, from_emit)) = failure {
            // A closed edge never reopens: report it once and stop.
            let terminal = from_emit && err.is_conveyor_closed();
            if err.is_cancelled() || ctx.report(&stage, Some(sequence), err).await.is_err() || terminal {
                break;
            }
        }
    }

    conveyor.close();
    debug!(stage = %stage, "stage closed");
}

/// Appends every record reaching the end of the chain to the sink and hands
/// the sink back once upstream ends.
pub(crate) async fn run_output<K: RecordSink>(
    mut sink: K,
    mut conveyor: Conveyor<Envelope>,
    ctx: StageContext,
) -> K {
    let stage = StageId::Output;
    debug!(stage = %stage, "stage started");

    // accept only fails on cancellation, so nothing but accepted records
    // ever reaches the sink.
    while let Ok(Some(envelope)) = conveyor.accept(&ctx.cancel).await {
        sink.append(envelope.payload);
        ctx.progress.inc_delivered();
    }

    conveyor.close();
    debug!(stage = %stage, "stage closed");
    sink
}
