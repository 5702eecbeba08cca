//! Thread budget of the image kernels.

use serde::{Deserialize, Serialize};

use crate::core::errors::ConfigError;

/// Size of the rayon pool shared by the rotation kernels.
///
/// Workers sharing a host with the recognition service usually want to leave it some
/// cores; `None` keeps one thread per core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelPolicy {
    pub max_threads: Option<usize>,
}

impl ParallelPolicy {
    pub fn with_max_threads(max_threads: usize) -> Self {
        Self {
            max_threads: Some(max_threads),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_threads == Some(0) {
            return Err(ConfigError::invalid_field(
                "max_threads",
                "at least one thread",
                0,
            ));
        }
        Ok(())
    }

    /// Builds the global pool when a thread count is set.
    ///
    /// Returns `Ok(false)` without touching rayon otherwise. Fails if the global pool
    /// already exists, so call it once, before any image is processed.
    pub fn install_global_thread_pool(&self) -> Result<bool, rayon::ThreadPoolBuildError> {
        let Some(threads) = self.max_threads else {
            return Ok(false);
        };
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("oar-htr-kernel-{index}"))
            .build_global()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_leaves_rayon_alone() {
        let policy = ParallelPolicy::default();
        assert_eq!(policy.install_global_thread_pool().ok(), Some(false));
        policy.validate().expect("default should validate");
    }

    #[test]
    fn test_zero_threads_is_rejected() {
        assert!(ParallelPolicy::with_max_threads(0).validate().is_err());
        ParallelPolicy::with_max_threads(3)
            .validate()
            .expect("three threads should validate");
    }

    #[test]
    fn test_policy_reads_from_json() {
        let policy: ParallelPolicy =
            serde_json::from_str(r#"{ "max_threads": 2 }"#).expect("should parse");
        assert_eq!(policy, ParallelPolicy::with_max_threads(2));
    }
}
