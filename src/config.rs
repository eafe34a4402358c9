/*!
 * Transfer configuration
 */

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransferError};
use crate::planner::DEFAULT_CHUNK_SIZE;
use crate::retry::RetryPolicy;

fn default_threads() -> usize {
    4
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    1
}

fn default_show_progress() -> bool {
    true
}

/// Settings for a single move operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveConfig {
    /// Number of concurrent transfer workers
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Chunk size in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Attempts per chunk, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in seconds; doubles per retry
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Render a terminal progress bar
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,

    /// Enable debug-level logging
    #[serde(default)]
    pub verbose: bool,
}

impl Default for MoveConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            chunk_size: default_chunk_size(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            show_progress: default_show_progress(),
            verbose: false,
        }
    }
}

impl MoveConfig {
    /// Validate settings before any provider call
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(TransferError::InvalidChunkConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.threads == 0 {
            return Err(TransferError::InvalidChunkConfig(
                "thread count must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.retry_delay_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MoveConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.threads, 4);
        assert_eq!(config.chunk_size, 64 * 1024 * 1024);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let config = MoveConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TransferError::InvalidChunkConfig(_))
        ));

        let config = MoveConfig {
            threads: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: MoveConfig = serde_json::from_str(r#"{"threads": 8}"#).unwrap();
        assert_eq!(config.threads, 8);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(config.show_progress);
    }
}
