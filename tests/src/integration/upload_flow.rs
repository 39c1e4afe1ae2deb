//! # Upload Flow
//!
//! oc-02 upload service driving the real storage adapters, which drive the
//! oc-01 agent over the mock transport.
//!
//! ## Flow Tested:
//!
//! 1. **Allocation (query)**: `allocated_bucket_v2_msgpack` on the storage index
//! 2. **Chunks (update)**: `upload_chunk_v2_msgpack` on the allocated bucket,
//!    answered synchronously or after polling
//! 3. **Failure surfaces**: refused allocation, exhausted chunk attempts

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use oc_01_canister_agent::{
        wire_method_name, AgentConfig, CanisterAgent, CanisterClient, CanisterId, Codec,
        MockRequest, MockRequestKind, MockResponse, MockTransport, RejectCode, Rejection,
        TransportFailure, Value,
    };
    use oc_02_blob_upload::adapters::schemas::{
        ALLOCATED_BUCKET_METHOD, ALLOCATED_BUCKET_RESPONSE, UPLOAD_CHUNK_ARGS,
        UPLOAD_CHUNK_METHOD, UPLOAD_CHUNK_RESPONSE,
    };
    use oc_02_blob_upload::{
        BlobUploadApi, FileHash, StorageBucketClient, StorageIndexClient, UploadConfig,
        UploadError, UploadService,
    };

    type Service = UploadService<StorageIndexClient, StorageBucketClient>;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn index_id() -> CanisterId {
        CanisterId::from_text("ryjl3-tyaaa-aaaaa-aaaba-cai").unwrap()
    }

    fn bucket_id() -> CanisterId {
        CanisterId::from_text("rrkah-fqaaa-aaaaa-aaaaq-cai").unwrap()
    }

    fn allowance() -> Value {
        Value::record([
            ("byte_limit", Value::from(1_000_000u64)),
            ("bytes_used", Value::from(0u64)),
            ("bytes_used_after_upload", Value::from(10u64)),
            ("bytes_used_after_operation", Value::from(10u64)),
        ])
    }

    /// Encoded `Success` allocation for `bucket_id()`.
    fn allocation_reply(file_id: u64, chunk_size: u32) -> Vec<u8> {
        let reply = Value::variant(
            "Success",
            Some(Value::record([
                ("canister_id", Value::Bytes(bucket_id().as_bytes().to_vec())),
                ("file_id", Value::from(file_id)),
                ("chunk_size", Value::from(chunk_size)),
                ("projected_allowance", allowance()),
            ])),
        );
        Codec::default()
            .encode(&reply, &ALLOCATED_BUCKET_RESPONSE)
            .unwrap()
    }

    fn chunk_reply(response: Value) -> Vec<u8> {
        Codec::default()
            .encode(&response, &UPLOAD_CHUNK_RESPONSE)
            .unwrap()
    }

    fn chunk_stored() -> Vec<u8> {
        chunk_reply(Value::variant("Success", None))
    }

    fn decode_chunk(request: &MockRequest) -> Value {
        Codec::default().decode(&request.arg, &UPLOAD_CHUNK_ARGS).unwrap()
    }

    fn chunk_index(request: &MockRequest) -> u128 {
        decode_chunk(request)
            .get("chunk_index")
            .and_then(Value::as_nat)
            .unwrap()
    }

    fn is_allocation(request: &MockRequest) -> bool {
        request.method == wire_method_name(ALLOCATED_BUCKET_METHOD)
    }

    /// Upload service over `transport`.
    fn service(transport: &MockTransport) -> Service {
        let agent = Arc::new(CanisterAgent::new(
            AgentConfig::for_testing(),
            Arc::new(transport.clone()),
            Arc::new(transport.verifier()),
        ));
        let index = StorageIndexClient::new(CanisterClient::new(Arc::clone(&agent), index_id()));
        let bucket = StorageBucketClient::new(agent);
        UploadService::new(UploadConfig::for_testing(), Arc::new(index), Arc::new(bucket))
    }

    // =============================================================================
    // INTEGRATION TESTS: SUCCESSFUL UPLOADS
    // =============================================================================

    /// Chunks arrive at the allocated bucket and reassemble to the payload.
    #[tokio::test]
    async fn test_upload_reassembles_payload_in_bucket() {
        let received: Arc<Mutex<Vec<(u128, Vec<u8>)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let transport = MockTransport::new(move |request| {
            if is_allocation(request) {
                return MockResponse::Reply(allocation_reply(42, 4));
            }
            let chunk = decode_chunk(request);
            let index = chunk.get("chunk_index").and_then(Value::as_nat).unwrap();
            let bytes = chunk.get("bytes").and_then(Value::as_bytes).unwrap().to_vec();
            sink.lock().push((index, bytes));
            MockResponse::Reply(chunk_stored())
        });
        let service = service(&transport);
        let payload = b"hello, storage".to_vec();

        let reference = service
            .upload_data(&[bucket_id()], "text/plain", &payload)
            .await
            .unwrap();

        assert_eq!(reference.file_id, 42);
        assert_eq!(reference.bucket, bucket_id());

        let mut chunks = received.lock().clone();
        chunks.sort_by_key(|(index, _)| *index);
        assert_eq!(chunks.len(), 4);
        let reassembled: Vec<u8> = chunks.into_iter().flat_map(|(_, bytes)| bytes).collect();
        assert_eq!(reassembled, payload);

        let requests = transport.requests();
        let queries: Vec<_> = requests
            .iter()
            .filter(|r| r.kind == MockRequestKind::Query)
            .collect();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].target, index_id());
        assert!(requests
            .iter()
            .filter(|r| r.kind == MockRequestKind::Call)
            .all(|r| r.target == bucket_id()
                && r.method == wire_method_name(UPLOAD_CHUNK_METHOD)));
    }

    /// Every chunk carries the whole-payload hash and metadata.
    #[tokio::test]
    async fn test_chunks_carry_file_metadata() {
        let transport = MockTransport::new(|request| {
            if is_allocation(request) {
                MockResponse::Reply(allocation_reply(7, 8))
            } else {
                MockResponse::Reply(chunk_stored())
            }
        });
        let service = service(&transport);
        let payload = vec![0xAB; 20];

        let uploaded = service
            .upload_file("image/png", &[bucket_id()], &payload, Some(1_700_000_000_000))
            .await
            .unwrap();
        assert_eq!(uploaded.projected_allowance.byte_limit, 1_000_000);

        let hash = FileHash::of(&payload);
        for request in transport
            .requests()
            .iter()
            .filter(|r| r.kind == MockRequestKind::Call)
        {
            let chunk = decode_chunk(request);
            assert_eq!(chunk.get("hash").and_then(Value::as_bytes), Some(&hash.as_bytes()[..]));
            assert_eq!(chunk.get("mime_type").and_then(Value::as_text), Some("image/png"));
            assert_eq!(chunk.get("total_size").and_then(Value::as_nat), Some(20));
            assert_eq!(chunk.get("file_id").and_then(Value::as_nat), Some(7));
            assert_eq!(chunk.get("expiry").and_then(Value::as_nat), Some(1_700_000_000_000));
        }
        assert_eq!(transport.count(MockRequestKind::Call), 3);
    }

    /// Accepted chunk calls are resolved by polling the bucket.
    #[tokio::test(start_paused = true)]
    async fn test_polled_chunk_completion() {
        let transport = MockTransport::new(|request| {
            if is_allocation(request) {
                return MockResponse::Reply(allocation_reply(1, 5));
            }
            match request.kind {
                MockRequestKind::Call => MockResponse::Pending,
                _ => MockResponse::Reply(chunk_stored()),
            }
        });
        let service = service(&transport);

        service
            .upload_data(&[], "text/plain", b"0123456789abc")
            .await
            .unwrap();

        assert_eq!(transport.count(MockRequestKind::Call), 3);
        assert_eq!(transport.count(MockRequestKind::ReadState), 3);
    }

    /// Transient allocation failures are absorbed by the agent's query retry.
    #[tokio::test(start_paused = true)]
    async fn test_allocation_retried_by_agent() {
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&failures);
        let transport = MockTransport::new(move |request| {
            if !is_allocation(request) {
                return MockResponse::Reply(chunk_stored());
            }
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                MockResponse::Fail(TransportFailure::new("connection reset by peer"))
            } else {
                MockResponse::Reply(allocation_reply(3, 64))
            }
        });
        let service = service(&transport);

        service.upload_data(&[], "text/plain", b"abc").await.unwrap();

        assert_eq!(transport.count(MockRequestKind::Query), 3);
        assert_eq!(transport.count(MockRequestKind::Call), 1);
    }

    /// Concurrent uploads share one agent and fetch the root key once.
    #[tokio::test]
    async fn test_concurrent_uploads_share_agent() {
        let transport = MockTransport::new(|request| {
            if is_allocation(request) {
                MockResponse::Reply(allocation_reply(9, 16))
            } else {
                MockResponse::Reply(chunk_stored())
            }
        });
        let service = service(&transport);
        let first = vec![1u8; 40];
        let second = vec![2u8; 40];

        let (a, b) = futures::join!(
            service.upload_data(&[], "image/png", &first),
            service.upload_data(&[], "image/png", &second),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(transport.count(MockRequestKind::Query), 2);
        assert_eq!(transport.count(MockRequestKind::Call), 6);
        assert_eq!(transport.root_key_fetches(), 1);
    }

    // =============================================================================
    // INTEGRATION TESTS: FAILURES
    // =============================================================================

    /// A refused allocation sends no chunks.
    #[tokio::test]
    async fn test_allowance_exceeded_refuses_upload() {
        let transport = MockTransport::new(|_| {
            MockResponse::Reply(
                Codec::default()
                    .encode(
                        &Value::variant("AllowanceExceeded", Some(allowance())),
                        &ALLOCATED_BUCKET_RESPONSE,
                    )
                    .unwrap(),
            )
        });
        let service = service(&transport);

        let err = service.upload_data(&[], "image/png", b"abc").await.unwrap_err();

        assert!(matches!(err, UploadError::AllocationRefused { .. }));
        assert_eq!(transport.count(MockRequestKind::Call), 0);
    }

    /// A chunk rejected on every attempt aborts after five immediate tries.
    #[tokio::test]
    async fn test_rejected_chunk_exhausts_attempts() {
        let transport = MockTransport::new(|request| {
            if is_allocation(request) {
                return MockResponse::Reply(allocation_reply(1, 2));
            }
            if chunk_index(request) == 1 {
                MockResponse::Reject(Rejection {
                    reject_code: RejectCode::CanisterError,
                    reject_message: "bucket busy".to_string(),
                    error_code: Some("IC0503".to_string()),
                })
            } else {
                MockResponse::Reply(chunk_stored())
            }
        });
        let service = service(&transport);

        let err = service.upload_data(&[], "image/png", b"abcdef").await.unwrap_err();

        match err {
            UploadError::ChunkFailed {
                index,
                attempts,
                last_failure,
            } => {
                assert_eq!(index, 1);
                assert_eq!(attempts, 5);
                assert!(last_failure.contains("bucket busy"));
            }
            other => panic!("expected chunk failure, got {other:?}"),
        }
        let chunk_one_calls = transport
            .requests()
            .iter()
            .filter(|r| r.kind == MockRequestKind::Call && chunk_index(r) == 1)
            .count();
        assert_eq!(chunk_one_calls, 5);
    }

    /// A non-success bucket response is a failed attempt, not a transport error.
    #[tokio::test]
    async fn test_chunk_size_mismatch_response_fails_upload() {
        let transport = MockTransport::new(|request| {
            if is_allocation(request) {
                return MockResponse::Reply(allocation_reply(1, 64));
            }
            MockResponse::Reply(chunk_reply(Value::variant(
                "ChunkSizeMismatch",
                Some(Value::record([
                    ("expected_chunk_size", Value::from(64u32)),
                    ("actual_chunk_size", Value::from(3u32)),
                ])),
            )))
        });
        let service = service(&transport);

        let err = service.upload_data(&[], "image/png", b"abc").await.unwrap_err();

        assert!(
            matches!(err, UploadError::ChunkFailed { index: 0, ref last_failure, .. } if last_failure.contains("ChunkSizeMismatch"))
        );
        assert_eq!(transport.count(MockRequestKind::Call), 5);
    }

    /// A retried chunk that the bucket already holds completes the upload.
    #[tokio::test]
    async fn test_chunk_already_exists_completes_upload() {
        let transport = MockTransport::new(|request| {
            if is_allocation(request) {
                MockResponse::Reply(allocation_reply(1, 64))
            } else {
                MockResponse::Reply(chunk_reply(Value::variant("ChunkAlreadyExists", None)))
            }
        });
        let service = service(&transport);

        assert!(service.upload_data(&[], "image/png", b"abc").await.is_ok());
        assert_eq!(transport.count(MockRequestKind::Call), 1);
    }
}
