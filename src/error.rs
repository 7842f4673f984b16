// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("invalid pair key/value `{0}`. Valid format key:value")]
    InvalidPair(String),

    #[error("casting type is not ok, type mismatch: expected object, got {found}")]
    TypeMismatch { found: &'static str },

    #[error("Decode error on line {line}: {source}")]
    Decode {
        line: u64,
        source: serde_json::Error,
    },

    #[error("Source error: {0}")]
    Source(String),

    #[error("{0}")]
    Operation(String),

    #[error("Conveyor closed: {0}")]
    ConveyorClosed(&'static str),

    #[error("Pipeline cancelled")]
    Cancelled,

    #[error("Stage worker failed: {0}")]
    Stage(String),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_conveyor_closed(&self) -> bool {
        matches!(self, Self::ConveyorClosed(_))
    }
}
