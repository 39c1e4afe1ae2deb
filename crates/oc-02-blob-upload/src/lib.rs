//! # OC-02 Blob Upload
//!
//! Content-addressed chunked uploads to storage buckets.
//!
//! **Subsystem ID:** 02
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Upload Flow
//!
//! 1. Hash the payload (SHA3-256) and ask the storage index for a bucket,
//!    file id and chunk size (`allocated_bucket_v2`, a query).
//! 2. Partition the payload into `ceil(size / chunk_size)` chunks.
//! 3. Send every chunk to the bucket (`upload_chunk_v2`, an update) with
//!    bounded concurrency. Each chunk gets up to 5 immediate attempts;
//!    `ChunkAlreadyExists` counts as stored.
//! 4. Return the bucket and file id, or the first fatal error.
//!
//! ## Module Structure
//!
//! ```text
//! oc-02-blob-upload/
//! ├── domain/          # FileHash, UploadPlan, BlobReference, UploadError
//! ├── algorithms/      # Chunk partitioning
//! ├── ports/           # BlobUploadApi, StorageIndex, StorageBucket + mocks
//! ├── adapters/        # Storage canister clients and wire schemas
//! ├── application/     # UploadService
//! └── config.rs        # UploadConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{StorageBucketClient, StorageIndexClient};
pub use application::UploadService;
pub use config::UploadConfig;
pub use domain::{
    AllocatedBucketArgs, AllocatedBucketResponse, AllocatedBucketSuccess, BlobReference,
    FileHash, ProjectedAllowance, UploadChunkArgs, UploadChunkResponse, UploadError, UploadPlan,
    UploadedFile, FILES_PATH_PREFIX,
};
pub use ports::{
    BlobUploadApi, MockStorageBucket, MockStorageIndex, RecordedChunk, StorageBucket,
    StorageIndex,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
