//! # Domain Errors
//!
//! Error types for blob uploads. There is no partial success: an upload
//! either returns a reference or one of these.

use oc_01_canister_agent::{CallError, ErrorKind};
use thiserror::Error;

/// Blob upload error types.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The allocation call itself failed.
    #[error("Allocation call failed: {0}")]
    Allocation(#[source] CallError),

    /// The storage index answered with something other than `Success`.
    #[error("Allocation refused: {reason}")]
    AllocationRefused {
        /// Response tag and details.
        reason: String,
    },

    /// The allocation cannot drive an upload.
    #[error("Invalid upload plan: {0}")]
    InvalidPlan(String),

    /// A chunk failed on every attempt.
    #[error("Chunk {index} failed after {attempts} attempts: {last_failure}")]
    ChunkFailed {
        /// Chunk index.
        index: u32,
        /// Attempts made.
        attempts: u32,
        /// Last error or response.
        last_failure: String,
    },
}

impl UploadError {
    /// Kind of the underlying call error, for allocation failures.
    pub fn call_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Allocation(e) => Some(e.kind()),
            _ => None,
        }
    }
}
