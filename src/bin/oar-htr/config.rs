//! Configuration assembly for the CLI.

use oar_htr::core::{AppConfig, ConfigError};
use std::path::{Path, PathBuf};

/// Values given on the command line or through `OAR_HTR_*` variables.
///
/// They take precedence over the configuration file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database: Option<PathBuf>,
    pub uploads_dir: Option<PathBuf>,
    pub segments_dir: Option<PathBuf>,
    pub recognizer_url: Option<String>,
    pub threads: Option<usize>,
}

/// Loads the configuration file, if any, and applies `overrides`.
pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => AppConfig::from_path(path)?,
        None => AppConfig::default(),
    };

    if let Some(database) = overrides.database {
        config.worker.database = database;
    }
    if let Some(uploads_dir) = overrides.uploads_dir {
        config.worker.uploads_dir = uploads_dir;
    }
    if let Some(segments_dir) = overrides.segments_dir {
        config.worker.segments_dir = segments_dir;
    }
    if let Some(endpoint) = overrides.recognizer_url {
        config.worker.recognizer.endpoint = endpoint;
    }
    if overrides.threads.is_some() {
        config.parallel.max_threads = overrides.threads;
    }

    config.validate()?;
    Ok(config)
}
