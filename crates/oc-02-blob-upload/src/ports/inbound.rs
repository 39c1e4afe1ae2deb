//! # Inbound Ports
//!
//! API exposed to bot code.

use async_trait::async_trait;
use oc_01_canister_agent::CanisterId;

use crate::domain::{BlobReference, UploadError, UploadedFile};

/// Blob upload API - inbound port.
#[async_trait]
pub trait BlobUploadApi: Send + Sync {
    /// Upload `bytes` readable by `accessors`, returning its reference.
    async fn upload_data(
        &self,
        accessors: &[CanisterId],
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<BlobReference, UploadError>;

    /// Upload `bytes` with an optional expiry, returning full details.
    async fn upload_file(
        &self,
        mime_type: &str,
        accessors: &[CanisterId],
        bytes: &[u8],
        expiry_millis: Option<u64>,
    ) -> Result<UploadedFile, UploadError>;
}
