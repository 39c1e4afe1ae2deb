//! # OpenChat Transport Benchmarks
//!
//! Hot paths of the transport layer:
//!
//! | Subsystem | Path | Target |
//! |-----------|------|--------|
//! | oc-01 Codec | Encode + validate a 1 MiB chunk argument | < 5ms |
//! | oc-01 Codec | Decode + conform + validate an allocation reply | < 50µs |
//! | oc-01 Classifier | Classify a transport failure message | < 10µs |
//! | oc-02 Partition | Plan a 100 MiB upload | < 10µs |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::RngCore;
use std::time::Duration;

use oc_01_canister_agent::{
    Codec, ErrorClassifier, MessagePatternClassifier, RecordEncoding, TransportFailure, Value,
};
use oc_02_blob_upload::adapters::schemas::{
    upload_chunk_args, ALLOCATED_BUCKET_RESPONSE, UPLOAD_CHUNK_ARGS,
};
use oc_02_blob_upload::algorithms::partition;
use oc_02_blob_upload::{FileHash, UploadChunkArgs};

// ============================================================================
// OC-01: Codec Benchmarks
// ============================================================================

fn chunk_args(len: usize) -> UploadChunkArgs {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    UploadChunkArgs {
        accessors: vec![],
        chunk_index: 0,
        file_id: 1,
        hash: FileHash::of(&bytes),
        mime_type: "application/octet-stream".to_string(),
        total_size: len as u64,
        bytes,
        chunk_size: len as u32,
        expiry: None,
    }
}

fn bench_codec_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("oc-01-codec-encode");
    group.measurement_time(Duration::from_secs(10));

    for size in [64 * 1024, 1024 * 1024] {
        let value = upload_chunk_args(&chunk_args(size));
        group.throughput(Throughput::Bytes(size as u64));
        for encoding in [RecordEncoding::Positional, RecordEncoding::Named] {
            let codec = Codec::new(encoding);
            group.bench_with_input(
                BenchmarkId::new(format!("{encoding:?}"), size),
                &value,
                |b, value| b.iter(|| black_box(codec.encode(value, &UPLOAD_CHUNK_ARGS).is_ok())),
            );
        }
    }
    group.finish();
}

fn bench_codec_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("oc-01-codec-decode");

    let reply = Value::variant(
        "Success",
        Some(Value::record([
            ("canister_id", Value::Bytes(vec![0, 0, 0, 0, 0, 0, 0, 1, 1, 1])),
            ("file_id", Value::from(42u64)),
            ("chunk_size", Value::from(1_048_576u32)),
            (
                "projected_allowance",
                Value::record([
                    ("byte_limit", Value::from(1u64 << 30)),
                    ("bytes_used", Value::from(0u64)),
                    ("bytes_used_after_upload", Value::from(1u64 << 20)),
                    ("bytes_used_after_operation", Value::from(1u64 << 20)),
                ]),
            ),
        ])),
    );
    let codec = Codec::default();
    let bytes = match codec.encode(&reply, &ALLOCATED_BUCKET_RESPONSE) {
        Ok(bytes) => bytes,
        Err(e) => panic!("allocation reply does not encode: {e}"),
    };

    group.bench_function("allocation_reply", |b| {
        b.iter(|| black_box(codec.decode(&bytes, &ALLOCATED_BUCKET_RESPONSE).is_ok()))
    });
    group.finish();
}

// ============================================================================
// OC-01: Classifier Benchmarks
// ============================================================================

fn bench_classifier(c: &mut Criterion) {
    let mut group = c.benchmark_group("oc-01-classifier");
    let classifier = MessagePatternClassifier::new();

    let failures = [
        ("destination", TransportFailure::new("Canister abc: DestinationInvalid")),
        ("lagging", TransportFailure::new("replica is not up to date")),
        (
            "status",
            TransportFailure::new("Server returned an error:\n  Code: 503 (Service Unavailable)"),
        ),
        ("fallthrough", TransportFailure::new("connection reset by peer")),
    ];
    for (name, failure) in &failures {
        group.bench_with_input(BenchmarkId::new("classify", name), failure, |b, failure| {
            b.iter(|| black_box(classifier.classify(failure)))
        });
    }
    group.finish();
}

// ============================================================================
// OC-02: Partition Benchmarks
// ============================================================================

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("oc-02-partition");
    for chunk_size in [256 * 1024, 1024 * 1024, 2 * 1024 * 1024] {
        group.bench_with_input(
            BenchmarkId::new("100MiB", chunk_size),
            &chunk_size,
            |b, &chunk_size| b.iter(|| black_box(partition(100 * 1024 * 1024, chunk_size).len())),
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_codec_encode,
    bench_codec_decode,
    bench_classifier,
    bench_partition
);
criterion_main!(benches);
