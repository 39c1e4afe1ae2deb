//! # Domain Module
//!
//! Core types for canister calls: identifiers, the error taxonomy and the
//! certified state tree.

pub mod certificate;
pub mod errors;
pub mod value_objects;

pub use certificate::*;
pub use errors::*;
pub use value_objects::*;
