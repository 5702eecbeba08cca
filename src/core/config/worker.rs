//! Configuration of the job coordinator and its collaborators.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::core::errors::ConfigError;

/// Serialises a [`Duration`] as whole milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Where and how lines are sent for recognition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    /// URL accepting a PNG line image and answering with `{ "text", "confidence" }`.
    pub endpoint: String,
    /// Per-line request timeout; expiry counts as a failed line.
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/recognize".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Job coordinator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Sleep between polls when no document is waiting.
    #[serde(with = "duration_ms")]
    pub idle_interval: Duration,
    /// Sleep after a failed polling cycle.
    #[serde(with = "duration_ms")]
    pub error_backoff: Duration,
    /// Directory receiving line crops.
    pub segments_dir: PathBuf,
    /// Directory receiving submitted source files.
    pub uploads_dir: PathBuf,
    /// SQLite database file.
    pub database: PathBuf,
    pub recognizer: RecognizerConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_secs(2),
            error_backoff: Duration::from_secs(5),
            segments_dir: PathBuf::from("segments"),
            uploads_dir: PathBuf::from("uploads"),
            database: PathBuf::from("oar-htr.db"),
            recognizer: RecognizerConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Checks that every value is inside its domain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_interval.is_zero() {
            return Err(ConfigError::invalid_field(
                "idle_interval",
                "a non-zero duration",
                "0ms",
            ));
        }
        if self.error_backoff < self.idle_interval {
            return Err(ConfigError::invalid_field(
                "error_backoff",
                format!("at least idle_interval ({:?})", self.idle_interval),
                format!("{:?}", self.error_backoff),
            ));
        }
        if self.recognizer.timeout.is_zero() {
            return Err(ConfigError::invalid_field(
                "recognizer.timeout",
                "a non-zero duration",
                "0ms",
            ));
        }
        Ok(())
    }
}
