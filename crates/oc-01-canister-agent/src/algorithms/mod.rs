//! # Algorithms
//!
//! - `classifier`: transport failure → [`AgentError`](crate::domain::AgentError)
//! - `retry`: capped exponential backoff for queries
//! - `poll`: delay schedule for certified update calls

pub mod classifier;
pub mod poll;
pub mod retry;

pub use classifier::{ErrorClassifier, MessagePatternClassifier};
pub use poll::PollStrategy;
pub use retry::{RetryPolicy, RetryingQueryExecutor};
