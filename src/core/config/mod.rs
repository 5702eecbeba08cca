//! Configuration management.
//!
//! This module provides the configuration types of the pipeline and the worker,
//! their defaults and validation, and loading from a JSON file.

pub mod parallel;
pub mod pipeline;
pub mod worker;

pub use parallel::ParallelPolicy;
pub use pipeline::PipelineConfig;
pub use worker::{RecognizerConfig, WorkerConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::errors::ConfigError;

/// Complete application configuration as stored in a JSON file.
///
/// Every section and field is optional in the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub worker: WorkerConfig,
    pub parallel: ParallelPolicy,
}

impl AppConfig {
    /// Reads and validates a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        self.worker.validate()?;
        self.parallel.validate()
    }
}
