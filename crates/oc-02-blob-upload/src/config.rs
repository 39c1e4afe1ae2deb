//! # Upload Configuration
//!
//! Per-chunk retry budget and fan-out bound.

use serde::{Deserialize, Serialize};

/// Attempts per chunk before the upload is aborted.
pub const DEFAULT_CHUNK_ATTEMPTS: u32 = 5;

/// Chunk uploads in flight at once.
pub const DEFAULT_MAX_CONCURRENT_CHUNKS: usize = 10;

/// Upload configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Attempts per chunk, retried immediately.
    pub chunk_attempts: u32,

    /// Upper bound on concurrent chunk uploads.
    pub max_concurrent_chunks: usize,

    /// Expiry forwarded with every chunk, in epoch milliseconds.
    #[serde(default)]
    pub expiry_millis: Option<u64>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_attempts: DEFAULT_CHUNK_ATTEMPTS,
            max_concurrent_chunks: DEFAULT_MAX_CONCURRENT_CHUNKS,
            expiry_millis: None,
        }
    }
}

impl UploadConfig {
    /// Create a config for testing.
    pub fn for_testing() -> Self {
        Self {
            max_concurrent_chunks: 4,
            ..Self::default()
        }
    }
}
