//! # Value Objects
//!
//! Content hash and the request/response shapes of the storage index and
//! storage bucket canisters.

use std::fmt;

use oc_01_canister_agent::CanisterId;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

/// Path prefix under which a bucket serves uploaded files.
pub const FILES_PATH_PREFIX: &str = "/files/";

/// SHA3-256 of an upload's full payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHash([u8; 32]);

impl FileHash {
    /// Hash `bytes`.
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha3_256::digest(bytes).into())
    }

    /// Wrap a precomputed hash.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileHash({})", hex::encode(&self.0[..8]))
    }
}

/// Storage allowance before and after an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectedAllowance {
    /// Total bytes the user may store.
    pub byte_limit: u64,
    /// Bytes stored now.
    pub bytes_used: u64,
    /// Bytes stored once this upload completes.
    pub bytes_used_after_upload: u64,
    /// Bytes stored once the whole operation completes.
    pub bytes_used_after_operation: u64,
}

/// `allocated_bucket_v2` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedBucketArgs {
    /// Content hash.
    pub file_hash: FileHash,
    /// Payload size in bytes.
    pub file_size: u64,
    /// Seed the index derives the file id from.
    pub file_id_seed: Option<u128>,
}

/// Successful allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedBucketSuccess {
    /// Bucket that will hold the file.
    pub canister_id: CanisterId,
    /// File identifier within the bucket.
    pub file_id: u64,
    /// Chunk size chosen by the index.
    pub chunk_size: u32,
    /// Allowance after the upload.
    pub projected_allowance: ProjectedAllowance,
}

/// `allocated_bucket_v2` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocatedBucketResponse {
    /// Bucket allocated.
    Success(AllocatedBucketSuccess),
    /// Upload would exceed the user's allowance.
    AllowanceExceeded(ProjectedAllowance),
    /// User unknown to the index.
    UserNotFound,
    /// No bucket can take the file.
    BucketUnavailable,
}

impl AllocatedBucketResponse {
    /// Tag name.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Success(_) => "Success",
            Self::AllowanceExceeded(_) => "AllowanceExceeded",
            Self::UserNotFound => "UserNotFound",
            Self::BucketUnavailable => "BucketUnavailable",
        }
    }
}

/// `upload_chunk_v2` arguments.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadChunkArgs {
    /// Principals allowed to read the file.
    pub accessors: Vec<CanisterId>,
    /// Zero-based chunk index.
    pub chunk_index: u32,
    /// File identifier from the allocation.
    pub file_id: u64,
    /// Hash of the whole payload.
    pub hash: FileHash,
    /// MIME type of the payload.
    pub mime_type: String,
    /// Size of the whole payload.
    pub total_size: u64,
    /// Chunk bytes.
    pub bytes: Vec<u8>,
    /// Chunk size from the allocation.
    pub chunk_size: u32,
    /// Expiry timestamp in milliseconds.
    pub expiry: Option<u64>,
}

impl fmt::Debug for UploadChunkArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadChunkArgs")
            .field("file_id", &self.file_id)
            .field("chunk_index", &self.chunk_index)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("total_size", &self.total_size)
            .finish_non_exhaustive()
    }
}

/// `upload_chunk_v2` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadChunkResponse {
    /// Chunk stored.
    Success,
    /// Upload would exceed the user's allowance.
    AllowanceExceeded(ProjectedAllowance),
    /// A completed file with this id already exists.
    FileAlreadyExists,
    /// File exceeds the bucket's limit.
    FileTooBig(u64),
    /// File expired before completion.
    FileExpired,
    /// Chunk already stored by an earlier attempt.
    ChunkAlreadyExists,
    /// Index beyond the file's chunk count.
    ChunkIndexTooHigh,
    /// Chunk length does not match the allocation.
    ChunkSizeMismatch {
        /// Expected length.
        expected_chunk_size: u32,
        /// Received length.
        actual_chunk_size: u32,
    },
    /// Bucket is full.
    Full,
    /// Hash differs from the one of earlier chunks.
    HashMismatch {
        /// Hash sent with this chunk.
        provided_hash: FileHash,
        /// Hash recorded for the file.
        actual_hash: FileHash,
        /// Chunks in the file.
        chunk_count: u32,
        /// Chunks not yet received.
        remaining_chunks: u32,
    },
    /// File id unknown to the bucket.
    InvalidFileId,
    /// User unknown to the bucket.
    UserNotFound,
}

impl UploadChunkResponse {
    /// Whether the chunk is stored, by this or an earlier attempt.
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Success | Self::ChunkAlreadyExists)
    }
}

impl fmt::Display for UploadChunkResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("Success"),
            Self::AllowanceExceeded(a) => write!(
                f,
                "AllowanceExceeded ({} of {} bytes)",
                a.bytes_used_after_upload, a.byte_limit
            ),
            Self::FileAlreadyExists => f.write_str("FileAlreadyExists"),
            Self::FileTooBig(limit) => write!(f, "FileTooBig (limit {limit})"),
            Self::FileExpired => f.write_str("FileExpired"),
            Self::ChunkAlreadyExists => f.write_str("ChunkAlreadyExists"),
            Self::ChunkIndexTooHigh => f.write_str("ChunkIndexTooHigh"),
            Self::ChunkSizeMismatch {
                expected_chunk_size,
                actual_chunk_size,
            } => write!(
                f,
                "ChunkSizeMismatch (expected {expected_chunk_size}, got {actual_chunk_size})"
            ),
            Self::Full => f.write_str("Full"),
            Self::HashMismatch { .. } => f.write_str("HashMismatch"),
            Self::InvalidFileId => f.write_str("InvalidFileId"),
            Self::UserNotFound => f.write_str("UserNotFound"),
        }
    }
}
