//! Storage index facade over the canister agent.

use async_trait::async_trait;
use oc_01_canister_agent::{CallError, CanisterClient};

use super::schemas::{
    allocated_bucket_args, allocated_bucket_response, ALLOCATED_BUCKET_ARGS,
    ALLOCATED_BUCKET_METHOD, ALLOCATED_BUCKET_RESPONSE,
};
use crate::domain::{AllocatedBucketArgs, AllocatedBucketResponse};
use crate::ports::StorageIndex;

/// Storage index canister client.
///
/// Allocation is a query, so it goes through the retrying executor.
#[derive(Clone)]
pub struct StorageIndexClient {
    client: CanisterClient,
}

impl StorageIndexClient {
    /// Facade over `client`, which must target the storage index.
    pub fn new(client: CanisterClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StorageIndex for StorageIndexClient {
    async fn allocated_bucket(
        &self,
        args: &AllocatedBucketArgs,
    ) -> Result<AllocatedBucketResponse, CallError> {
        self.client
            .query(
                ALLOCATED_BUCKET_METHOD,
                &allocated_bucket_args(args),
                &ALLOCATED_BUCKET_ARGS,
                &ALLOCATED_BUCKET_RESPONSE,
                allocated_bucket_response,
            )
            .await
    }
}
