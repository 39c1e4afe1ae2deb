//! Wire schemas and value mappings for the storage canisters.

use lazy_static::lazy_static;
use oc_01_canister_agent::{AgentError, CallSchema, CanisterId, NatWidth, Value};

use crate::domain::{
    AllocatedBucketArgs, AllocatedBucketResponse, AllocatedBucketSuccess, FileHash,
    ProjectedAllowance, UploadChunkArgs, UploadChunkResponse,
};

/// Storage index method allocating a bucket.
pub const ALLOCATED_BUCKET_METHOD: &str = "allocated_bucket_v2";

/// Storage bucket method storing a chunk.
pub const UPLOAD_CHUNK_METHOD: &str = "upload_chunk_v2";

fn nat(width: NatWidth) -> CallSchema {
    CallSchema::Nat(width)
}

fn principal() -> CallSchema {
    CallSchema::bytes()
}

fn projected_allowance() -> CallSchema {
    CallSchema::record([
        ("byte_limit", nat(NatWidth::U64)),
        ("bytes_used", nat(NatWidth::U64)),
        ("bytes_used_after_upload", nat(NatWidth::U64)),
        ("bytes_used_after_operation", nat(NatWidth::U64)),
    ])
}

lazy_static! {
    /// `allocated_bucket_v2` request.
    pub static ref ALLOCATED_BUCKET_ARGS: CallSchema = CallSchema::record([
        ("file_hash", CallSchema::fixed_bytes(32)),
        ("file_size", nat(NatWidth::U64)),
        ("file_id_seed", CallSchema::optional(nat(NatWidth::U128))),
    ]);

    /// `allocated_bucket_v2` response.
    pub static ref ALLOCATED_BUCKET_RESPONSE: CallSchema = CallSchema::variant([
        (
            "Success",
            Some(CallSchema::record([
                ("canister_id", principal()),
                ("file_id", nat(NatWidth::U64)),
                ("chunk_size", nat(NatWidth::U32)),
                ("projected_allowance", projected_allowance()),
            ])),
        ),
        ("AllowanceExceeded", Some(projected_allowance())),
        ("UserNotFound", None),
        ("BucketUnavailable", None),
    ]);

    /// `upload_chunk_v2` request.
    pub static ref UPLOAD_CHUNK_ARGS: CallSchema = CallSchema::record([
        ("accessors", CallSchema::array(principal())),
        ("chunk_index", nat(NatWidth::U32)),
        ("file_id", nat(NatWidth::U64)),
        ("hash", CallSchema::fixed_bytes(32)),
        ("mime_type", CallSchema::Text),
        ("total_size", nat(NatWidth::U64)),
        ("bytes", CallSchema::bytes()),
        ("chunk_size", nat(NatWidth::U32)),
        ("expiry", CallSchema::optional(nat(NatWidth::U64))),
    ]);

    /// `upload_chunk_v2` response.
    pub static ref UPLOAD_CHUNK_RESPONSE: CallSchema = CallSchema::variant([
        ("Success", None),
        ("AllowanceExceeded", Some(projected_allowance())),
        ("FileAlreadyExists", None),
        ("FileTooBig", Some(nat(NatWidth::U64))),
        ("FileExpired", None),
        ("ChunkAlreadyExists", None),
        ("ChunkIndexTooHigh", None),
        (
            "ChunkSizeMismatch",
            Some(CallSchema::record([
                ("expected_chunk_size", nat(NatWidth::U32)),
                ("actual_chunk_size", nat(NatWidth::U32)),
            ])),
        ),
        ("Full", None),
        (
            "HashMismatch",
            Some(CallSchema::record([
                ("provided_hash", CallSchema::fixed_bytes(32)),
                ("actual_hash", CallSchema::fixed_bytes(32)),
                ("chunk_count", nat(NatWidth::U32)),
                ("remaining_chunks", nat(NatWidth::U32)),
            ])),
        ),
        ("InvalidFileId", None),
        ("UserNotFound", None),
    ]);
}

// =============================================================================
// Requests
// =============================================================================

/// Value form of [`AllocatedBucketArgs`].
pub fn allocated_bucket_args(args: &AllocatedBucketArgs) -> Value {
    let mut fields = vec![
        ("file_hash", Value::Bytes(args.file_hash.as_bytes().to_vec())),
        ("file_size", Value::from(args.file_size)),
    ];
    if let Some(seed) = args.file_id_seed {
        fields.push(("file_id_seed", Value::from(seed)));
    }
    Value::record(fields)
}

/// Value form of [`UploadChunkArgs`].
pub fn upload_chunk_args(args: &UploadChunkArgs) -> Value {
    let mut fields = vec![
        (
            "accessors",
            Value::Array(
                args.accessors
                    .iter()
                    .map(|a| Value::Bytes(a.as_bytes().to_vec()))
                    .collect(),
            ),
        ),
        ("chunk_index", Value::from(args.chunk_index)),
        ("file_id", Value::from(args.file_id)),
        ("hash", Value::Bytes(args.hash.as_bytes().to_vec())),
        ("mime_type", Value::from(args.mime_type.as_str())),
        ("total_size", Value::from(args.total_size)),
        ("bytes", Value::Bytes(args.bytes.clone())),
        ("chunk_size", Value::from(args.chunk_size)),
    ];
    if let Some(expiry) = args.expiry {
        fields.push(("expiry", Value::from(expiry)));
    }
    Value::record(fields)
}

// =============================================================================
// Responses
// =============================================================================

/// Map a validated `allocated_bucket_v2` reply.
pub fn allocated_bucket_response(value: Value) -> Result<AllocatedBucketResponse, AgentError> {
    let (tag, payload) = variant(&value)?;
    match tag {
        "Success" => {
            let success = required(payload, "$::Success")?;
            let canister_id = bytes(success, "canister_id")?;
            Ok(AllocatedBucketResponse::Success(AllocatedBucketSuccess {
                canister_id: CanisterId::from_slice(canister_id).map_err(|e| {
                    AgentError::response_mismatch("$::Success.canister_id", "principal", e.to_string())
                })?,
                file_id: nat_u64(success, "file_id")?,
                chunk_size: nat_u32(success, "chunk_size")?,
                projected_allowance: allowance(field(success, "projected_allowance")?)?,
            }))
        }
        "AllowanceExceeded" => Ok(AllocatedBucketResponse::AllowanceExceeded(allowance(
            required(payload, "$::AllowanceExceeded")?,
        )?)),
        "UserNotFound" => Ok(AllocatedBucketResponse::UserNotFound),
        "BucketUnavailable" => Ok(AllocatedBucketResponse::BucketUnavailable),
        other => Err(unknown_tag(other)),
    }
}

/// Map a validated `upload_chunk_v2` reply.
pub fn upload_chunk_response(value: Value) -> Result<UploadChunkResponse, AgentError> {
    let (tag, payload) = variant(&value)?;
    match tag {
        "Success" => Ok(UploadChunkResponse::Success),
        "AllowanceExceeded" => Ok(UploadChunkResponse::AllowanceExceeded(allowance(
            required(payload, "$::AllowanceExceeded")?,
        )?)),
        "FileAlreadyExists" => Ok(UploadChunkResponse::FileAlreadyExists),
        "FileTooBig" => {
            let limit = required(payload, "$::FileTooBig")?
                .as_nat()
                .and_then(|n| u64::try_from(n).ok())
                .ok_or_else(|| AgentError::response_mismatch("$::FileTooBig", "nat64", "other"))?;
            Ok(UploadChunkResponse::FileTooBig(limit))
        }
        "FileExpired" => Ok(UploadChunkResponse::FileExpired),
        "ChunkAlreadyExists" => Ok(UploadChunkResponse::ChunkAlreadyExists),
        "ChunkIndexTooHigh" => Ok(UploadChunkResponse::ChunkIndexTooHigh),
        "ChunkSizeMismatch" => {
            let p = required(payload, "$::ChunkSizeMismatch")?;
            Ok(UploadChunkResponse::ChunkSizeMismatch {
                expected_chunk_size: nat_u32(p, "expected_chunk_size")?,
                actual_chunk_size: nat_u32(p, "actual_chunk_size")?,
            })
        }
        "Full" => Ok(UploadChunkResponse::Full),
        "HashMismatch" => {
            let p = required(payload, "$::HashMismatch")?;
            Ok(UploadChunkResponse::HashMismatch {
                provided_hash: hash(p, "provided_hash")?,
                actual_hash: hash(p, "actual_hash")?,
                chunk_count: nat_u32(p, "chunk_count")?,
                remaining_chunks: nat_u32(p, "remaining_chunks")?,
            })
        }
        "InvalidFileId" => Ok(UploadChunkResponse::InvalidFileId),
        "UserNotFound" => Ok(UploadChunkResponse::UserNotFound),
        other => Err(unknown_tag(other)),
    }
}

fn variant(value: &Value) -> Result<(&str, Option<&Value>), AgentError> {
    value
        .as_variant()
        .ok_or_else(|| AgentError::response_mismatch("$", "variant", value.to_string()))
}

fn unknown_tag(tag: &str) -> AgentError {
    AgentError::response_mismatch("$", "known variant", tag)
}

fn required<'a>(payload: Option<&'a Value>, path: &str) -> Result<&'a Value, AgentError> {
    payload.ok_or_else(|| AgentError::response_mismatch(path, "payload", "absent"))
}

fn field<'a>(record: &'a Value, name: &str) -> Result<&'a Value, AgentError> {
    record
        .get(name)
        .ok_or_else(|| AgentError::response_mismatch(format!("$.{name}"), "field", "absent"))
}

fn bytes<'a>(record: &'a Value, name: &str) -> Result<&'a [u8], AgentError> {
    field(record, name)?
        .as_bytes()
        .ok_or_else(|| AgentError::response_mismatch(format!("$.{name}"), "bytes", "other"))
}

fn hash(record: &Value, name: &str) -> Result<FileHash, AgentError> {
    let raw: [u8; 32] = bytes(record, name)?
        .try_into()
        .map_err(|_| AgentError::response_mismatch(format!("$.{name}"), "bytes[32]", "other length"))?;
    Ok(FileHash::from_bytes(raw))
}

fn nat_u64(record: &Value, name: &str) -> Result<u64, AgentError> {
    field(record, name)?
        .as_nat()
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| AgentError::response_mismatch(format!("$.{name}"), "nat64", "other"))
}

fn nat_u32(record: &Value, name: &str) -> Result<u32, AgentError> {
    field(record, name)?
        .as_nat()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| AgentError::response_mismatch(format!("$.{name}"), "nat32", "other"))
}

fn allowance(record: &Value) -> Result<ProjectedAllowance, AgentError> {
    Ok(ProjectedAllowance {
        byte_limit: nat_u64(record, "byte_limit")?,
        bytes_used: nat_u64(record, "bytes_used")?,
        bytes_used_after_upload: nat_u64(record, "bytes_used_after_upload")?,
        bytes_used_after_operation: nat_u64(record, "bytes_used_after_operation")?,
    })
}
