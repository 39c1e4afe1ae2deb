//! # Ports Module
//!
//! Outbound dependencies of the canister agent.

pub mod outbound;

pub use outbound::*;
