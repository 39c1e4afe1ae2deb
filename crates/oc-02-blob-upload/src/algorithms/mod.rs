//! # Algorithms
//!
//! - `partition`: chunk byte ranges for an upload plan

pub mod partition;

pub use partition::partition;
