//! # Entities
//!
//! The upload plan built from an allocation, and the references an upload
//! hands back.

use std::fmt;
use std::ops::Range;

use oc_01_canister_agent::CanisterId;
use serde::{Deserialize, Serialize};

use super::errors::UploadError;
use super::value_objects::{FileHash, ProjectedAllowance, FILES_PATH_PREFIX};
use crate::algorithms::partition;

/// Immutable plan for one upload.
///
/// `chunk_count = ceil(total_size / chunk_size)`; the chunks partition
/// `[0, total_size)` exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPlan {
    /// Hash of the whole payload.
    pub content_hash: FileHash,
    /// Payload size.
    pub total_size: u64,
    /// Chunk size chosen by the allocator.
    pub chunk_size: u32,
    /// Number of chunks.
    pub chunk_count: u32,
    /// Bucket receiving the chunks.
    pub destination: CanisterId,
    /// File identifier within the bucket.
    pub file_id: u64,
}

impl UploadPlan {
    /// Build a plan, rejecting a zero chunk size.
    pub fn new(
        content_hash: FileHash,
        total_size: u64,
        chunk_size: u32,
        destination: CanisterId,
        file_id: u64,
    ) -> Result<Self, UploadError> {
        if chunk_size == 0 {
            return Err(UploadError::InvalidPlan(
                "allocator returned a chunk size of zero".to_string(),
            ));
        }
        let chunk_count = u32::try_from(total_size.div_ceil(u64::from(chunk_size))).map_err(|_| {
            UploadError::InvalidPlan(format!(
                "{total_size} bytes in chunks of {chunk_size} exceeds the chunk index range"
            ))
        })?;

        Ok(Self {
            content_hash,
            total_size,
            chunk_size,
            chunk_count,
            destination,
            file_id,
        })
    }

    /// `(index, byte range)` of every chunk, in order.
    pub fn chunks(&self) -> impl Iterator<Item = (u32, Range<usize>)> {
        partition(self.total_size as usize, self.chunk_size as usize)
            .into_iter()
            .enumerate()
            .map(|(i, range)| (i as u32, range))
    }
}

/// Stable handle to a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobReference {
    /// File identifier within the bucket.
    pub file_id: u64,
    /// Bucket holding the file.
    pub bucket: CanisterId,
}

impl BlobReference {
    /// Public URL of the blob on the raw domain of `host` (e.g. `icp0.io`).
    pub fn url(&self, host: &str) -> String {
        format!(
            "https://{}.raw.{}{}{}",
            self.bucket, host, FILES_PATH_PREFIX, self.file_id
        )
    }
}

impl fmt::Display for BlobReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.bucket, FILES_PATH_PREFIX, self.file_id)
    }
}

/// Full result of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Where the file lives.
    pub reference: BlobReference,
    /// Allowance reported at allocation.
    pub projected_allowance: ProjectedAllowance,
    /// Path prefix the bucket serves files under.
    pub path_prefix: &'static str,
}
