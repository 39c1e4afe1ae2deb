//! # Application Module
//!
//! The remote call client and its per-canister binding.

pub mod client;
pub mod service;

pub use client::CanisterClient;
pub use service::CanisterAgent;
