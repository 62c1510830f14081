//! Engine configuration.

use serde::{Deserialize, Serialize};

use hashdrop_transfer::{DEFAULT_HASH_PROGRESS_THRESHOLD, DEFAULT_MAX_FILE_SIZE};

use crate::retry::RetryPolicy;

/// Tunables for [`UploadEngine`](crate::UploadEngine).
///
/// Every field has a default, so a partial table deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest admissible file in bytes.
    pub max_file_size: u64,

    /// Files uploaded at the same time by a batch.
    pub max_concurrent_files: usize,

    /// Origin tag stored with each file record.
    pub device_id: String,

    /// Policy for pre-check, init, finalize and confirm calls.
    pub request_retry: RetryPolicy,

    /// Policy for individual chunk PUTs.
    pub chunk_retry: RetryPolicy,

    /// Files at or below this size report hashing as a single step.
    pub hash_progress_threshold: u64,
}

fn default_device_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "hashdrop-client".into())
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_concurrent_files: 3,
            device_id: default_device_id(),
            request_retry: RetryPolicy::requests(),
            chunk_retry: RetryPolicy::chunks(),
            hash_progress_threshold: DEFAULT_HASH_PROGRESS_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_file_size, 10 * 1024 * 1024 * 1024);
        assert_eq!(config.max_concurrent_files, 3);
        assert!(!config.device_id.is_empty());
        assert_eq!(config.request_retry.max_attempts, 2);
        assert_eq!(config.chunk_retry.max_attempts, 4);
        assert_eq!(config.hash_progress_threshold, 2 * 1024 * 1024);
    }

    #[test]
    fn partial_input_keeps_defaults() {
        let json = r#"{"max_concurrent_files": 1, "chunk_retry": {"max_attempts": 2}}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_concurrent_files, 1);
        assert_eq!(config.chunk_retry.max_attempts, 2);
        assert_eq!(config.chunk_retry.base_delay_ms, 1000);
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
    }
}
