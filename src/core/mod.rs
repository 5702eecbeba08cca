//! The core module of the crate.
//!
//! This module contains the components every other module builds on:
//! - Configuration management
//! - Error handling
//!
//! It also provides re-exports of the commonly used types.

pub mod config;
pub mod errors;

pub use config::{AppConfig, ParallelPolicy, PipelineConfig, RecognizerConfig, WorkerConfig};
pub use errors::{
    ArtifactError, BoxError, ConfigError, JobError, PipelineError, PipelineStage,
    RecognitionError, StoreError,
};
