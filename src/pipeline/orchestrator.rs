// file: src/pipeline/orchestrator.rs
// description: builds the stage chain, runs it concurrently, collects errors and flushes the sink
// reference: orchestrates the concurrent record pipeline

use crate::config::PipelineConfig;
use crate::conveyor::Conveyor;
use crate::error::{PipelineError, Result};
use crate::io::{RecordSink, RecordSource};
use crate::operation::SharedOperation;
use crate::pipeline::progress::{ProgressTracker, RunStats};
use crate::pipeline::report::{ErrorReport, StageError, StageId};
use crate::pipeline::stage::{self, StageContext};
use crate::record::Envelope;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Runs records from a source through a chain of operations into a sink, one
/// worker per stage, connected by bounded conveyors.
///
/// Per-record failures do not fail a run. They are collected into
/// [`ConveyorProcessor::errors`], which callers should inspect after every
/// run, including successful ones.
#[derive(Debug, Default)]
pub struct ConveyorProcessor {
    config: PipelineConfig,
    errors: ErrorReport,
    stats: RunStats,
}

impl ConveyorProcessor {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            errors: ErrorReport::new(),
            stats: RunStats::new(),
        }
    }

    /// Errors reported by the most recent run, in the order they were received.
    pub fn errors(&self) -> &ErrorReport {
        &self.errors
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Processes every record of `source` through `operations` and flushes
    /// the result into `sink`.
    ///
    /// Returns the flushed sink, or the sink's flush error. If `cancel` fires
    /// the workers stop, nothing is flushed and `PipelineError::Cancelled`
    /// is returned.
    pub async fn process<S, K>(
        &mut self,
        cancel: &CancellationToken,
        source: S,
        sink: K,
        operations: &[SharedOperation],
    ) -> Result<K>
    where
        S: RecordSource + 'static,
        K: RecordSink + 'static,
    {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline", run_id = %run_id, operations = operations.len());

        self.run(cancel, source, sink, operations)
            .instrument(span)
            .await
    }

    async fn run<S, K>(
        &mut self,
        cancel: &CancellationToken,
        source: S,
        sink: K,
        operations: &[SharedOperation],
    ) -> Result<K>
    where
        S: RecordSource + 'static,
        K: RecordSink + 'static,
    {
        info!("Starting pipeline with {} operation(s)", operations.len());
        self.errors.clear();

        let progress = Arc::new(ProgressTracker::new());
        let tracker = TaskTracker::new();
        let (error_tx, mut error_rx) = mpsc::channel(self.config.error_buffer.max(1));
        let ctx = StageContext::new(error_tx, cancel.clone(), progress.clone());

        let mut workers: Vec<(StageId, JoinHandle<()>)> = Vec::with_capacity(operations.len() + 1);

        let mut head: Conveyor<Envelope> = Conveyor::head(self.config.conveyor_capacity);
        let mut downstream = head.chain_next()?;
        workers.push((
            StageId::Input,
            tracker.spawn(stage::run_input(source, head, ctx.clone())),
        ));

        for (index, operation) in operations.iter().enumerate() {
            let mut current = downstream;
            downstream = current.chain_next()?;

            let id = StageId::operation(index, operation.name());
            let handle = tracker.spawn(stage::run_operation(
                id.clone(),
                operation.clone(),
                current,
                ctx.clone(),
            ));
            workers.push((id, handle));
        }

        // The last context clone moves into the output worker so that the
        // orchestrator holds no error sender of its own.
        let output = tracker.spawn(stage::run_output(sink, downstream, ctx));
        tracker.close();

        loop {
            tokio::select! {
                biased;
                Some(entry) = error_rx.recv() => self.errors.push(entry),
                _ = tracker.wait() => break,
            }
        }

        // A worker's final send completes before it exits, so anything still
        // buffered here was sent before completion fired.
        while let Ok(entry) = error_rx.try_recv() {
            self.errors.push(entry);
        }

        for (stage, handle) in workers {
            if let Err(e) = handle.await {
                self.errors.push(StageError::new(
                    stage,
                    None,
                    PipelineError::Stage(e.to_string()),
                ));
            }
        }

        let sink = output
            .await
            .map_err(|e| PipelineError::Stage(format!("output stage failed: {}", e)));

        self.stats = progress.get_stats(self.errors.len());
        self.log_final_stats();

        let mut sink = sink?;

        if cancel.is_cancelled() {
            warn!("Pipeline cancelled before completion, skipping flush");
            return Err(PipelineError::Cancelled);
        }

        debug!("Flushing sink");
        sink.write().await?;

        info!("Pipeline complete");
        Ok(sink)
    }

    fn log_final_stats(&self) {
        let stats = &self.stats;
        info!("=== Pipeline Execution Summary ===");
        info!("Duration: {} ms", stats.duration_ms);
        info!("Records read: {}", stats.records_read);
        info!("Records delivered: {}", stats.records_delivered);
        info!("Records skipped: {}", stats.records_skipped);
        info!("Errors reported: {}", stats.records_failed);
        info!("Delivery rate: {:.2}%", stats.delivery_rate());
        info!("Throughput: {:.2} records/sec", stats.records_per_second());
        info!("=================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{JsonLinesSink, LineSource, MemorySource};
    use crate::operation::{self, FilterOperation, Operation, Outcome, PrefixOperation};
    use crate::record::{PairKeyPrefix, PairKeyValue, Record};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use std::time::Duration;

    const STDIN_INPUT: &str = r#"{"id":7064,"lat":48.88340457471041,"lng":2.3952910238105294,"created_at":"2016-12-14 18:48:10"}
{"id":11426,"lat":48.927968740518686,"lng":2.2497446977911437,"created_at":"2016-12-14 18:48:10"}
{"id":1629,"lat":48.83168740132889,"lng":2.2485795413465577,"created_at":"2016-12-14 18:48:11"}"#;

    fn memory_sink() -> JsonLinesSink<Vec<u8>> {
        JsonLinesSink::new(Vec::new())
    }

    fn ids(n: i64) -> Vec<Value> {
        (0..n).map(|id| json!({ "id": id })).collect()
    }

    fn expected_output() -> String {
        STDIN_INPUT
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).unwrap().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn run(
        processor: &mut ConveyorProcessor,
        records: Vec<Value>,
        operations: &[SharedOperation],
    ) -> Vec<Value> {
        let sink = processor
            .process(
                &CancellationToken::new(),
                MemorySource::new(records),
                memory_sink(),
                operations,
            )
            .await
            .unwrap();
        sink.records().to_vec()
    }

    #[tokio::test]
    async fn test_process_without_operation() {
        let mut processor = ConveyorProcessor::default();
        let source = LineSource::new(STDIN_INPUT.as_bytes());

        let sink = processor
            .process(&CancellationToken::new(), source, memory_sink(), &[])
            .await
            .unwrap();

        assert_eq!(String::from_utf8(sink.into_writer()).unwrap(), expected_output());
        assert!(processor.errors().is_empty());
    }

    #[tokio::test]
    async fn test_process_with_identity_operation() {
        let mut processor = ConveyorProcessor::default();
        let identity = operation::from_fn("identity", |record| Ok(Outcome::Emit(record)));
        let source = LineSource::new(STDIN_INPUT.as_bytes());

        let sink = processor
            .process(&CancellationToken::new(), source, memory_sink(), &[identity])
            .await
            .unwrap();

        assert_eq!(String::from_utf8(sink.into_writer()).unwrap(), expected_output());
        assert!(processor.errors().is_empty());
    }

    #[tokio::test]
    async fn test_process_with_failing_operation_reports_every_record() {
        let mut processor = ConveyorProcessor::default();
        let failing = operation::from_fn("failing", |_| {
            Err(PipelineError::operation("operation fails"))
        });

        let delivered = run(&mut processor, ids(3), &[failing]).await;

        assert!(delivered.is_empty());
        let messages: Vec<String> = processor
            .errors()
            .iter()
            .map(|e| e.error.to_string())
            .collect();
        assert_eq!(messages, vec!["operation fails"; 3]);
        assert_eq!(processor.stats().records_failed, 3);
    }

    #[tokio::test]
    async fn test_zero_operations_preserve_order_across_backpressure() {
        let mut processor = ConveyorProcessor::new(PipelineConfig {
            conveyor_capacity: 2,
            error_buffer: 1,
        });
        let records = ids(500);

        let delivered = run(&mut processor, records.clone(), &[]).await;

        assert_eq!(delivered, records);
        assert_eq!(processor.stats().records_read, 500);
        assert_eq!(processor.stats().records_delivered, 500);
    }

    #[tokio::test]
    async fn test_filter_scenario() {
        let mut processor = ConveyorProcessor::default();
        let filter: SharedOperation =
            Arc::new(FilterOperation::new(vec![PairKeyValue::new("id", "2")]));

        let delivered = run(
            &mut processor,
            vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})],
            &[filter],
        )
        .await;

        assert_eq!(delivered, vec![json!({"id": 1}), json!({"id": 3})]);
        assert!(processor.errors().is_empty());
        assert_eq!(processor.stats().records_skipped, 1);
    }

    #[tokio::test]
    async fn test_prefix_scenario() {
        let mut processor = ConveyorProcessor::default();
        let prefix: SharedOperation =
            Arc::new(PrefixOperation::new(vec![PairKeyPrefix::new("id", "_")]));

        let delivered = run(&mut processor, vec![json!({"id": 1})], &[prefix]).await;

        assert_eq!(delivered, vec![json!({"_id": 1})]);
    }

    #[tokio::test]
    async fn test_non_object_record_is_type_mismatch_and_never_reaches_sink() {
        let mut processor = ConveyorProcessor::default();
        let identity = operation::from_fn("identity", |record| Ok(Outcome::Emit(record)));

        let delivered = run(
            &mut processor,
            vec![json!({"id": 1}), json!([1, 2]), json!({"id": 3})],
            &[identity],
        )
        .await;

        assert_eq!(delivered, vec![json!({"id": 1}), json!({"id": 3})]);
        assert_eq!(processor.errors().len(), 1);

        let entry = &processor.errors().entries()[0];
        assert_eq!(entry.stage, StageId::operation(0, "identity"));
        assert_eq!(entry.sequence, Some(1));
        assert!(matches!(entry.error, PipelineError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_non_object_passes_through_without_operations() {
        let mut processor = ConveyorProcessor::default();
        let delivered = run(&mut processor, vec![json!(5), json!("x")], &[]).await;
        assert_eq!(delivered, vec![json!(5), json!("x")]);
    }

    #[tokio::test]
    async fn test_source_error_is_reported_and_ends_input() {
        let mut processor = ConveyorProcessor::default();
        let source = MemorySource::new(ids(2))
            .with_failure(PipelineError::Source("read failed".to_string()));

        let sink = processor
            .process(&CancellationToken::new(), source, memory_sink(), &[])
            .await
            .unwrap();

        assert_eq!(sink.records().to_vec(), ids(2));
        assert_eq!(processor.errors().len(), 1);

        let entry = &processor.errors().entries()[0];
        assert_eq!(entry.stage, StageId::Input);
        assert_eq!(entry.sequence, Some(2));
    }

    #[tokio::test]
    async fn test_errors_are_collected_across_stages_in_chain() {
        let mut processor = ConveyorProcessor::default();
        let reject_odd = operation::from_fn("reject_odd", |record: Record| {
            match record.get(&"id".into()).and_then(Value::as_i64) {
                Some(id) if id % 2 == 1 => Err(PipelineError::operation("odd")),
                _ => Ok(Outcome::Emit(record)),
            }
        });
        let reject_four = operation::from_fn("reject_four", |record: Record| {
            match record.get(&"id".into()).and_then(Value::as_i64) {
                Some(4) => Err(PipelineError::operation("four")),
                _ => Ok(Outcome::Emit(record)),
            }
        });

        let delivered = run(&mut processor, ids(10), &[reject_odd, reject_four]).await;

        assert_eq!(
            delivered,
            vec![json!({"id": 0}), json!({"id": 2}), json!({"id": 6}), json!({"id": 8})]
        );
        assert_eq!(processor.errors().len(), 6);
        assert_eq!(
            processor
                .errors()
                .iter()
                .filter(|e| e.stage == StageId::operation(1, "reject_four"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_report_is_reset_between_runs() {
        let mut processor = ConveyorProcessor::default();
        let failing = operation::from_fn("failing", |_| Err(PipelineError::operation("nope")));

        run(&mut processor, ids(2), &[failing]).await;
        assert_eq!(processor.errors().len(), 2);

        run(&mut processor, ids(2), &[]).await;
        assert!(processor.errors().is_empty());
    }

    struct FailingSink;

    #[async_trait]
    impl RecordSink for FailingSink {
        fn append(&mut self, _record: Value) {}

        async fn write(&mut self) -> Result<()> {
            Err(PipelineError::Sink("flush failed".to_string()))
        }
    }

    #[tokio::test]
    async fn test_sink_error_is_the_run_result() {
        let mut processor = ConveyorProcessor::default();

        let result = processor
            .process(&CancellationToken::new(), MemorySource::new(ids(3)), FailingSink, &[])
            .await;

        assert!(matches!(result, Err(PipelineError::Sink(_))));
        assert!(processor.errors().is_empty());
    }

    /// Never ends on its own.
    struct EndlessSource;

    #[async_trait]
    impl RecordSource for EndlessSource {
        async fn next(&mut self, cancel: &CancellationToken) -> Result<Option<Value>> {
            tokio::select! {
                _ = cancel.cancelled() => Err(PipelineError::Cancelled),
                _ = tokio::time::sleep(Duration::from_millis(1)) => Ok(Some(json!({"id": 0}))),
            }
        }
    }

    struct Passthrough;

    impl Operation for Passthrough {
        fn name(&self) -> &str {
            "passthrough"
        }

        fn apply(&self, _cancel: &CancellationToken, record: Record) -> Result<Outcome> {
            Ok(Outcome::Emit(record))
        }
    }

    #[tokio::test]
    async fn test_cancellation_stops_every_worker_without_flush() {
        let mut processor = ConveyorProcessor::new(PipelineConfig {
            conveyor_capacity: 4,
            error_buffer: 1,
        });
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let passthrough: SharedOperation = Arc::new(Passthrough);
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            processor.process(&cancel, EndlessSource, FailingSink, &[passthrough]),
        )
        .await
        .expect("cancelled pipeline must terminate");

        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[tokio::test]
    async fn test_panicking_operation_is_reported() {
        let mut processor = ConveyorProcessor::default();
        let panicking = operation::from_fn("panicking", |_| panic!("operation exploded"));

        let delivered = run(&mut processor, ids(1), &[panicking]).await;

        assert!(delivered.is_empty());
        assert!(
            processor
                .errors()
                .iter()
                .any(|e| matches!(e.error, PipelineError::Stage(_)))
        );
    }

    fn count_closed(processor: &ConveyorProcessor, stage: &StageId) -> usize {
        processor
            .errors()
            .iter()
            .filter(|e| &e.stage == stage && e.error.is_conveyor_closed())
            .count()
    }

    #[tokio::test]
    async fn test_panicking_operation_stops_upstream_after_one_report() {
        let mut processor = ConveyorProcessor::new(PipelineConfig {
            conveyor_capacity: 1,
            error_buffer: 1,
        });
        let panicking = operation::from_fn("panicking", |_| panic!("operation exploded"));

        let delivered = run(&mut processor, ids(1000), &[panicking]).await;

        assert!(delivered.is_empty());
        let stage_failures = processor
            .errors()
            .iter()
            .filter(|e| matches!(e.error, PipelineError::Stage(_)))
            .count();
        assert_eq!(stage_failures, 1);
        assert!(count_closed(&processor, &StageId::Input) <= 1);
        assert!(processor.errors().len() <= 2);
    }

    #[tokio::test]
    async fn test_panicking_last_operation_stops_every_upstream_stage() {
        let mut processor = ConveyorProcessor::new(PipelineConfig {
            conveyor_capacity: 1,
            error_buffer: 1,
        });
        let identity = operation::from_fn("identity", |record| Ok(Outcome::Emit(record)));
        let panicking = operation::from_fn("panicking", |_| panic!("operation exploded"));

        let delivered = run(&mut processor, ids(1000), &[identity, panicking]).await;

        assert!(delivered.is_empty());
        assert!(count_closed(&processor, &StageId::Input) <= 1);
        assert!(count_closed(&processor, &StageId::operation(0, "identity")) <= 1);
        assert!(processor.errors().len() <= 3);
    }

    #[tokio::test]
    async fn test_operation_returning_closed_error_is_record_level() {
        let mut processor = ConveyorProcessor::default();
        let failing = operation::from_fn("failing", |_| {
            Err(PipelineError::ConveyorClosed("not an edge failure"))
        });

        let delivered = run(&mut processor, ids(5), &[failing]).await;

        assert!(delivered.is_empty());
        assert_eq!(processor.errors().len(), 5);
    }
}
