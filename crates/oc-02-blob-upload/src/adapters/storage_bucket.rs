//! Storage bucket facade over the canister agent.

use std::sync::Arc;

use async_trait::async_trait;
use oc_01_canister_agent::{CallError, CanisterAgent, CanisterId};

use super::schemas::{
    upload_chunk_args, upload_chunk_response, UPLOAD_CHUNK_ARGS, UPLOAD_CHUNK_METHOD,
    UPLOAD_CHUNK_RESPONSE,
};
use crate::domain::{UploadChunkArgs, UploadChunkResponse};
use crate::ports::StorageBucket;

/// Storage bucket client.
///
/// The bucket is only known after allocation, so one client serves every
/// bucket through the shared agent.
#[derive(Clone)]
pub struct StorageBucketClient {
    agent: Arc<CanisterAgent>,
}

impl StorageBucketClient {
    /// Facade over `agent`.
    pub fn new(agent: Arc<CanisterAgent>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl StorageBucket for StorageBucketClient {
    async fn upload_chunk(
        &self,
        bucket: &CanisterId,
        args: &UploadChunkArgs,
    ) -> Result<UploadChunkResponse, CallError> {
        self.agent
            .update(
                bucket,
                UPLOAD_CHUNK_METHOD,
                &upload_chunk_args(args),
                &UPLOAD_CHUNK_ARGS,
                &UPLOAD_CHUNK_RESPONSE,
                upload_chunk_response,
            )
            .await
    }
}
