// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod build_info;
pub mod cli;
pub mod config;
pub mod conveyor;
pub mod error;
pub mod io;
pub mod operation;
pub mod pipeline;
pub mod record;
pub mod utils;

pub use config::{Config, OutputConfig, PipelineConfig};
pub use conveyor::Conveyor;
pub use error::{PipelineError, Result};
pub use io::{JsonLinesSink, LineSource, MemorySource, RecordSink, RecordSource};
pub use operation::{
    AppendOperation, FilterOperation, Operation, Outcome, PrefixOperation, RemoveOperation,
    SharedOperation,
};
pub use pipeline::{ConveyorProcessor, ErrorReport, RunStats, StageError, StageId};
pub use record::{Envelope, FieldValue, Key, PairKeyPrefix, PairKeyValue, Record};
