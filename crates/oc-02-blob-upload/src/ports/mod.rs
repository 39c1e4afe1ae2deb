//! # Ports Module
//!
//! Inbound upload API and outbound storage canister facades.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
