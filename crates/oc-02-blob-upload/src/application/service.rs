//! # Upload Service
//!
//! Chunked upload orchestrator.
//!
//! ```text
//! hash ──► allocate (no retry) ──► plan ──► chunks (bounded fan-out,
//!                                            up to N attempts each) ──► reference
//! ```
//!
//! Any chunk exhausting its attempts aborts the whole upload; chunks still in
//! flight are dropped. Uploads are not resumable: a new call starts again
//! from allocation.

use std::ops::Range;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use oc_01_canister_agent::CanisterId;
use tracing::{debug, info, warn};

use crate::config::UploadConfig;
use crate::domain::{
    AllocatedBucketArgs, AllocatedBucketResponse, BlobReference, FileHash, UploadChunkArgs,
    UploadChunkResponse, UploadError, UploadPlan, UploadedFile, FILES_PATH_PREFIX,
};
use crate::ports::{BlobUploadApi, StorageBucket, StorageIndex};

/// Fields shared by every chunk of one upload.
struct ChunkTemplate<'a> {
    plan: &'a UploadPlan,
    accessors: &'a [CanisterId],
    mime_type: &'a str,
    expiry: Option<u64>,
}

/// Upload Service - orchestrates allocation and chunk transfers.
pub struct UploadService<I: StorageIndex, B: StorageBucket> {
    /// Configuration.
    config: UploadConfig,
    /// Allocation facade.
    index: Arc<I>,
    /// Chunk facade.
    bucket: Arc<B>,
}

impl<I: StorageIndex, B: StorageBucket> UploadService<I, B> {
    /// Create a new upload service.
    pub fn new(config: UploadConfig, index: Arc<I>, bucket: Arc<B>) -> Self {
        Self {
            config,
            index,
            bucket,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Internal: allocate a bucket and build the plan.
    async fn allocate(&self, bytes: &[u8]) -> Result<(UploadPlan, UploadedFile), UploadError> {
        let content_hash = FileHash::of(bytes);
        let args = AllocatedBucketArgs {
            file_hash: content_hash,
            file_size: bytes.len() as u64,
            file_id_seed: Some(rand::random::<u128>()),
        };

        let success = match self
            .index
            .allocated_bucket(&args)
            .await
            .map_err(UploadError::Allocation)?
        {
            AllocatedBucketResponse::Success(success) => success,
            refused => {
                warn!(
                    hash = %content_hash,
                    size = bytes.len(),
                    response = refused.tag(),
                    "[oc-02] Allocation refused"
                );
                return Err(UploadError::AllocationRefused {
                    reason: format!("{refused:?}"),
                });
            }
        };

        let plan = UploadPlan::new(
            content_hash,
            args.file_size,
            success.chunk_size,
            success.canister_id.clone(),
            success.file_id,
        )?;
        debug!(
            bucket = %plan.destination,
            file_id = plan.file_id,
            chunk_size = plan.chunk_size,
            chunk_count = plan.chunk_count,
            "[oc-02] Bucket allocated"
        );

        let uploaded = UploadedFile {
            reference: BlobReference {
                file_id: success.file_id,
                bucket: success.canister_id,
            },
            projected_allowance: success.projected_allowance,
            path_prefix: FILES_PATH_PREFIX,
        };
        Ok((plan, uploaded))
    }

    /// Internal: upload one chunk, retrying immediately on any failure.
    async fn upload_chunk(
        &self,
        template: &ChunkTemplate<'_>,
        index: u32,
        bytes: Vec<u8>,
    ) -> Result<(), UploadError> {
        let plan = template.plan;
        let args = UploadChunkArgs {
            accessors: template.accessors.to_vec(),
            chunk_index: index,
            file_id: plan.file_id,
            hash: plan.content_hash,
            mime_type: template.mime_type.to_string(),
            total_size: plan.total_size,
            bytes,
            chunk_size: plan.chunk_size,
            expiry: template.expiry,
        };

        let attempts = self.config.chunk_attempts.max(1);
        let mut last_failure = String::new();
        for attempt in 1..=attempts {
            match self.bucket.upload_chunk(&plan.destination, &args).await {
                Ok(UploadChunkResponse::Success) => return Ok(()),
                Ok(UploadChunkResponse::ChunkAlreadyExists) => {
                    debug!(chunk_index = index, attempt, "[oc-02] Chunk already stored");
                    return Ok(());
                }
                Ok(response) => last_failure = response.to_string(),
                Err(error) => last_failure = error.to_string(),
            }
            warn!(
                file_id = plan.file_id,
                chunk_index = index,
                attempt,
                failure = %last_failure,
                "[oc-02] Chunk upload failed"
            );
        }

        Err(UploadError::ChunkFailed {
            index,
            attempts,
            last_failure,
        })
    }

    /// Internal: upload every chunk with bounded concurrency.
    async fn upload_chunks(
        &self,
        template: &ChunkTemplate<'_>,
        bytes: &[u8],
    ) -> Result<(), UploadError> {
        let limit = self.config.max_concurrent_chunks.max(1);
        let chunks: Vec<(u32, Range<usize>)> = template.plan.chunks().collect();

        stream::iter(chunks)
            .map(|(index, range)| self.upload_chunk(template, index, bytes[range].to_vec()))
            .buffer_unordered(limit)
            .try_collect::<Vec<()>>()
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<I: StorageIndex, B: StorageBucket> BlobUploadApi for UploadService<I, B> {
    async fn upload_data(
        &self,
        accessors: &[CanisterId],
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<BlobReference, UploadError> {
        self.upload_file(mime_type, accessors, bytes, None)
            .await
            .map(|uploaded| uploaded.reference)
    }

    async fn upload_file(
        &self,
        mime_type: &str,
        accessors: &[CanisterId],
        bytes: &[u8],
        expiry_millis: Option<u64>,
    ) -> Result<UploadedFile, UploadError> {
        let (plan, uploaded) = self.allocate(bytes).await?;
        let template = ChunkTemplate {
            plan: &plan,
            accessors,
            mime_type,
            expiry: expiry_millis.or(self.config.expiry_millis),
        };

        self.upload_chunks(&template, bytes).await?;

        info!(
            bucket = %plan.destination,
            file_id = plan.file_id,
            size = plan.total_size,
            chunks = plan.chunk_count,
            "[oc-02] Upload complete"
        );
        Ok(uploaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProjectedAllowance;
    use crate::ports::{MockStorageBucket, MockStorageIndex};
    use oc_01_canister_agent::{CallError, ErrorKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn bucket_id() -> CanisterId {
        CanisterId::from_text("rrkah-fqaaa-aaaaa-aaaaq-cai").unwrap()
    }

    fn service(
        index: MockStorageIndex,
        bucket: MockStorageBucket,
    ) -> (
        UploadService<MockStorageIndex, MockStorageBucket>,
        Arc<MockStorageIndex>,
        Arc<MockStorageBucket>,
    ) {
        let index = Arc::new(index);
        let bucket = Arc::new(bucket);
        let service = UploadService::new(
            UploadConfig::for_testing(),
            Arc::clone(&index),
            Arc::clone(&bucket),
        );
        (service, index, bucket)
    }

    #[tokio::test]
    async fn test_upload_partitions_by_allocated_chunk_size() {
        let (service, index, bucket) = service(
            MockStorageIndex::allocating(bucket_id(), 7, 4),
            MockStorageBucket::accepting(),
        );

        let reference = service
            .upload_data(&[bucket_id()], "text/plain", b"0123456789")
            .await
            .unwrap();

        assert_eq!(reference, BlobReference { file_id: 7, bucket: bucket_id() });
        let mut calls = bucket.calls();
        calls.sort_by_key(|c| c.chunk_index);
        let lens: Vec<usize> = calls.iter().map(|c| c.len).collect();
        assert_eq!(lens, vec![4, 4, 2]);
        assert!(calls.iter().all(|c| c.bucket == bucket_id()));

        let allocation = &index.calls()[0];
        assert_eq!(allocation.file_size, 10);
        assert_eq!(allocation.file_hash, FileHash::of(b"0123456789"));
        assert!(allocation.file_id_seed.is_some());
    }

    /// Bucket that holds each chunk for a while and records peak fan-out.
    #[derive(Default)]
    struct SlowBucket {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        stored: AtomicUsize,
    }

    #[async_trait]
    impl StorageBucket for SlowBucket {
        async fn upload_chunk(
            &self,
            _bucket: &CanisterId,
            _args: &UploadChunkArgs,
        ) -> Result<UploadChunkResponse, CallError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.stored.fetch_add(1, Ordering::SeqCst);
            Ok(UploadChunkResponse::Success)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_upload_concurrently_within_limit() {
        let config = UploadConfig {
            max_concurrent_chunks: 3,
            ..UploadConfig::for_testing()
        };
        let bucket = Arc::new(SlowBucket::default());
        let service = UploadService::new(
            config,
            Arc::new(MockStorageIndex::allocating(bucket_id(), 5, 1)),
            Arc::clone(&bucket),
        );

        service
            .upload_data(&[], "application/octet-stream", b"0123456789")
            .await
            .unwrap();

        let peak = bucket.peak.load(Ordering::SeqCst);
        assert!(peak > 1, "chunks were uploaded one at a time");
        assert!(peak <= 3, "fan-out {peak} exceeded the limit");
        assert_eq!(bucket.stored.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_chunk_recovers_on_fifth_attempt() {
        let (service, _, bucket) = service(
            MockStorageIndex::allocating(bucket_id(), 1, 2),
            MockStorageBucket::failing_chunk(1, 4),
        );

        service
            .upload_data(&[], "image/png", &[0u8; 6])
            .await
            .unwrap();
        assert_eq!(bucket.attempts_for(1), 5);
        assert_eq!(bucket.attempts_for(0), 1);
    }

    #[tokio::test]
    async fn test_chunk_exhaustion_aborts_upload() {
        let (service, _, bucket) = service(
            MockStorageIndex::allocating(bucket_id(), 1, 2),
            MockStorageBucket::failing_chunk(2, 5),
        );

        let err = service
            .upload_data(&[], "image/png", &[0u8; 6])
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::ChunkFailed { index: 2, attempts: 5, .. }));
        assert_eq!(bucket.attempts_for(2), 5);
    }

    #[tokio::test]
    async fn test_non_success_response_counts_as_failure() {
        let (service, _, bucket) = service(
            MockStorageIndex::allocating(bucket_id(), 1, 8),
            MockStorageBucket::new(|_, attempt| {
                Ok(if attempt < 3 {
                    UploadChunkResponse::Full
                } else {
                    UploadChunkResponse::Success
                })
            }),
        );

        service.upload_data(&[], "image/png", b"abc").await.unwrap();
        assert_eq!(bucket.attempts_for(0), 3);
    }

    #[tokio::test]
    async fn test_chunk_already_exists_is_success() {
        let (service, _, bucket) = service(
            MockStorageIndex::allocating(bucket_id(), 1, 8),
            MockStorageBucket::new(|_, _| Ok(UploadChunkResponse::ChunkAlreadyExists)),
        );

        service.upload_data(&[], "image/png", b"abc").await.unwrap();
        assert_eq!(bucket.attempts_for(0), 1);
    }

    #[tokio::test]
    async fn test_allocation_refused_is_fatal() {
        let (service, _, bucket) = service(
            MockStorageIndex::responding(AllocatedBucketResponse::AllowanceExceeded(
                ProjectedAllowance {
                    byte_limit: 10,
                    bytes_used: 10,
                    bytes_used_after_upload: 13,
                    bytes_used_after_operation: 13,
                },
            )),
            MockStorageBucket::accepting(),
        );

        let err = service.upload_data(&[], "image/png", b"abc").await.unwrap_err();
        assert!(matches!(err, UploadError::AllocationRefused { .. }));
        assert!(bucket.calls().is_empty());
    }

    #[tokio::test]
    async fn test_allocation_failure_is_not_retried() {
        let (service, index, bucket) = service(
            MockStorageIndex::failing("connection reset"),
            MockStorageBucket::accepting(),
        );

        let err = service.upload_data(&[], "image/png", b"abc").await.unwrap_err();
        assert_eq!(err.call_kind(), Some(ErrorKind::Transient));
        assert_eq!(index.calls().len(), 1);
        assert!(bucket.calls().is_empty());
    }

    #[tokio::test]
    async fn test_zero_chunk_size_is_invalid_plan() {
        let (service, _, _) = service(
            MockStorageIndex::allocating(bucket_id(), 1, 0),
            MockStorageBucket::accepting(),
        );
        let err = service.upload_data(&[], "image/png", b"abc").await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidPlan(_)));
    }

    #[tokio::test]
    async fn test_empty_payload_uploads_no_chunks() {
        let (service, index, bucket) = service(
            MockStorageIndex::allocating(bucket_id(), 3, 1024),
            MockStorageBucket::accepting(),
        );

        let reference = service.upload_data(&[], "text/plain", b"").await.unwrap();
        assert_eq!(reference.file_id, 3);
        assert_eq!(index.calls().len(), 1);
        assert!(bucket.calls().is_empty());
    }

    #[tokio::test]
    async fn test_upload_file_details_and_expiry() {
        let (service, _, bucket) = service(
            MockStorageIndex::allocating(bucket_id(), 5, 2),
            MockStorageBucket::accepting(),
        );

        let uploaded = service
            .upload_file("image/gif", &[bucket_id()], b"abc", Some(1_000))
            .await
            .unwrap();

        assert_eq!(uploaded.path_prefix, "/files/");
        assert_eq!(uploaded.reference.file_id, 5);
        assert_eq!(uploaded.projected_allowance.byte_limit, 1 << 30);
        assert!(bucket.calls().iter().all(|c| c.expiry == Some(1_000)));
    }

    #[tokio::test]
    async fn test_repeat_upload_allocates_again() {
        let (service, index, _) = service(
            MockStorageIndex::allocating(bucket_id(), 5, 2),
            MockStorageBucket::accepting(),
        );

        service.upload_data(&[], "image/png", b"abc").await.unwrap();
        service.upload_data(&[], "image/png", b"abc").await.unwrap();

        let calls = index.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].file_hash, calls[1].file_hash);
        assert_eq!(calls[0].file_size, calls[1].file_size);
    }
}
