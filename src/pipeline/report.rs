// file: src/pipeline/report.rs
// description: errors collected from stage workers during a run
// reference: append-only report mutated by the orchestrator's collection loop

use crate::error::PipelineError;
use std::fmt;

/// Identifies the stage that produced an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageId {
    Input,
    Operation { index: usize, name: String },
    Output,
}

impl StageId {
    pub fn operation(index: usize, name: impl Into<String>) -> Self {
        Self::Operation {
            index,
            name: name.into(),
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Operation { index, name } => write!(f, "operation #{} ({})", index, name),
            Self::Output => f.write_str("output"),
        }
    }
}

/// A reported error together with where it happened.
#[derive(Debug)]
pub struct StageError {
    pub stage: StageId,
    /// Zero-based position of the record in the source, when known.
    pub sequence: Option<u64>,
    pub error: PipelineError,
}

impl StageError {
    pub fn new(stage: StageId, sequence: Option<u64>, error: PipelineError) -> Self {
        Self {
            stage,
            sequence,
            error,
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sequence {
            Some(sequence) => write!(f, "[{}] record {}: {}", self.stage, sequence, self.error),
            None => write!(f, "[{}] {}", self.stage, self.error),
        }
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[derive(Debug, Default)]
pub struct ErrorReport {
    entries: Vec<StageError>,
}

impl ErrorReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, entry: StageError) {
        self.entries.push(entry);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageError> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[StageError] {
        &self.entries
    }
}

impl<'a> IntoIterator for &'a ErrorReport {
    type Item = &'a StageError;
    type IntoIter = std::slice::Iter<'a, StageError>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
