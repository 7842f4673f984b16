// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{PipelineError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound of records queued on a single conveyor edge.
pub const DEFAULT_CONVEYOR_CAPACITY: usize = 1024;

/// Error channel depth; one slot is the closest thing to a rendezvous.
pub const DEFAULT_ERROR_BUFFER: usize = 1;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub conveyor_capacity: usize,
    pub error_buffer: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub pretty: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            conveyor_capacity: DEFAULT_CONVEYOR_CAPACITY,
            error_buffer: DEFAULT_ERROR_BUFFER,
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder()
            .set_default("pipeline.conveyor_capacity", DEFAULT_CONVEYOR_CAPACITY as i64)
            .and_then(|b| b.set_default("pipeline.error_buffer", DEFAULT_ERROR_BUFFER as i64))
            .and_then(|b| b.set_default("output.pretty", false))
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CONVEYOR_BELT")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            output: OutputConfig { pretty: false },
        }
    }

    fn validate(&self) -> Result<()> {
        if self.pipeline.conveyor_capacity == 0 {
            return Err(PipelineError::Config(
                "conveyor_capacity must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.error_buffer == 0 {
            return Err(PipelineError::Config(
                "error_buffer must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
