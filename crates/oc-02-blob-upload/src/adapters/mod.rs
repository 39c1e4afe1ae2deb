//! # Adapters
//!
//! Storage canister facades built on the canister agent, and their wire
//! schemas.

pub mod schemas;
pub mod storage_bucket;
pub mod storage_index;

pub use storage_bucket::StorageBucketClient;
pub use storage_index::StorageIndexClient;
