//! # Integration Flows
//!
//! The agent, the storage adapters and the upload service wired together
//! over [`oc_01_canister_agent::MockTransport`], so every byte crosses the
//! real MessagePack codec.

pub mod upload_flow;
pub mod write_call_flow;
