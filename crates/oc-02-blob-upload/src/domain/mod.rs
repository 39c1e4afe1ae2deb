//! # Domain Module
//!
//! Upload plan, references, storage canister message shapes and errors.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use value_objects::*;
