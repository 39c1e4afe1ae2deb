//! # Outbound Ports
//!
//! The storage index (allocation facade) and storage buckets (chunk
//! facade). Production implementations live in `adapters`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use oc_01_canister_agent::{AgentError, CallError, CanisterId};
use parking_lot::Mutex;

use crate::domain::{
    AllocatedBucketArgs, AllocatedBucketResponse, AllocatedBucketSuccess, ProjectedAllowance,
    UploadChunkArgs, UploadChunkResponse,
};

/// Storage index - outbound port.
#[async_trait]
pub trait StorageIndex: Send + Sync {
    /// Ask for a bucket, file id and chunk size for new content.
    async fn allocated_bucket(
        &self,
        args: &AllocatedBucketArgs,
    ) -> Result<AllocatedBucketResponse, CallError>;
}

/// Storage bucket - outbound port.
#[async_trait]
pub trait StorageBucket: Send + Sync {
    /// Store one chunk in `bucket`.
    async fn upload_chunk(
        &self,
        bucket: &CanisterId,
        args: &UploadChunkArgs,
    ) -> Result<UploadChunkResponse, CallError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Transient call error as a mock would report it.
pub fn mock_call_error(target: &CanisterId, method: &str, message: &str) -> CallError {
    CallError {
        target: target.clone(),
        method: method.to_string(),
        args: String::new(),
        error: AgentError::transient(message),
    }
}

/// Mock storage index answering every allocation the same way.
pub struct MockStorageIndex {
    /// Index principal used in errors.
    pub canister_id: CanisterId,
    response: Result<AllocatedBucketResponse, String>,
    calls: Mutex<Vec<AllocatedBucketArgs>>,
}

impl MockStorageIndex {
    /// Allocate `bucket` with `chunk_size` for every request.
    pub fn allocating(bucket: CanisterId, file_id: u64, chunk_size: u32) -> Self {
        Self::responding(AllocatedBucketResponse::Success(AllocatedBucketSuccess {
            canister_id: bucket,
            file_id,
            chunk_size,
            projected_allowance: ProjectedAllowance {
                byte_limit: 1 << 30,
                ..ProjectedAllowance::default()
            },
        }))
    }

    /// Answer every request with `response`.
    pub fn responding(response: AllocatedBucketResponse) -> Self {
        Self {
            canister_id: Self::default_id(),
            response: Ok(response),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail every request with a transient call error.
    pub fn failing(message: &str) -> Self {
        Self {
            canister_id: Self::default_id(),
            response: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Requests seen so far.
    pub fn calls(&self) -> Vec<AllocatedBucketArgs> {
        self.calls.lock().clone()
    }

    fn default_id() -> CanisterId {
        CanisterId::from_slice(&[0, 0, 0, 0, 0, 0, 0, 9, 1, 1]).unwrap_or_else(|_| CanisterId::management())
    }
}

#[async_trait]
impl StorageIndex for MockStorageIndex {
    async fn allocated_bucket(
        &self,
        args: &AllocatedBucketArgs,
    ) -> Result<AllocatedBucketResponse, CallError> {
        self.calls.lock().push(args.clone());
        self.response
            .clone()
            .map_err(|message| mock_call_error(&self.canister_id, "allocated_bucket_v2", &message))
    }
}

/// Chunk upload seen by [`MockStorageBucket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedChunk {
    /// Bucket addressed.
    pub bucket: CanisterId,
    /// Chunk index.
    pub chunk_index: u32,
    /// Chunk length.
    pub len: usize,
    /// 1-based attempt number for this index.
    pub attempt: u32,
    /// Expiry forwarded.
    pub expiry: Option<u64>,
}

type ChunkHandler =
    dyn Fn(&UploadChunkArgs, u32) -> Result<UploadChunkResponse, String> + Send + Sync;

/// Scriptable storage bucket.
///
/// The handler sees the arguments and the attempt number for that chunk
/// index; `Err` becomes a transient call error.
pub struct MockStorageBucket {
    handler: Arc<ChunkHandler>,
    attempts: Mutex<HashMap<u32, u32>>,
    calls: Mutex<Vec<RecordedChunk>>,
}

impl MockStorageBucket {
    /// Bucket driven by `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&UploadChunkArgs, u32) -> Result<UploadChunkResponse, String> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            attempts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Bucket storing every chunk.
    pub fn accepting() -> Self {
        Self::new(|_, _| Ok(UploadChunkResponse::Success))
    }

    /// Bucket failing chunk `index` on its first `failures` attempts.
    pub fn failing_chunk(index: u32, failures: u32) -> Self {
        Self::new(move |args, attempt| {
            if args.chunk_index == index && attempt <= failures {
                Err(format!("connection reset uploading chunk {index}"))
            } else {
                Ok(UploadChunkResponse::Success)
            }
        })
    }

    /// Uploads seen so far.
    pub fn calls(&self) -> Vec<RecordedChunk> {
        self.calls.lock().clone()
    }

    /// Attempts made for chunk `index`.
    pub fn attempts_for(&self, index: u32) -> u32 {
        self.attempts.lock().get(&index).copied().unwrap_or(0)
    }
}

#[async_trait]
impl StorageBucket for MockStorageBucket {
    async fn upload_chunk(
        &self,
        bucket: &CanisterId,
        args: &UploadChunkArgs,
    ) -> Result<UploadChunkResponse, CallError> {
        let attempt = {
            let mut attempts = self.attempts.lock();
            let counter = attempts.entry(args.chunk_index).or_insert(0);
            *counter += 1;
            *counter
        };
        self.calls.lock().push(RecordedChunk {
            bucket: bucket.clone(),
            chunk_index: args.chunk_index,
            len: args.bytes.len(),
            attempt,
            expiry: args.expiry,
        });
        (self.handler)(args, attempt).map_err(|message| mock_call_error(bucket, "upload_chunk_v2", &message))
    }
}
