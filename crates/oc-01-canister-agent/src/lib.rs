//! # OC-01 Canister Agent
//!
//! Remote calls against canisters: MessagePack codec with two-sided schema
//! validation, retrying queries and certified update calls.
//!
//! **Subsystem ID:** 01
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Call Styles
//!
//! | Style | Path | Retry |
//! |-------|------|-------|
//! | Query | encode → query → status → decode → map | Exponential backoff for `Transient`/`ReplicaLagging` |
//! | Update | encode → submit → certificate (sync or polled) → decode → map | None; poll until terminal or timeout |
//!
//! Logical method `foo` is invoked on the wire as `foo_msgpack`.
//!
//! ## Error Taxonomy
//!
//! Transport failures only carry text. [`MessagePatternClassifier`] maps
//! them to [`AgentError`]; every failure leaving the agent is a
//! [`CallError`] carrying target, method and arguments.
//!
//! ## Module Structure
//!
//! ```text
//! oc-01-canister-agent/
//! ├── domain/          # CanisterId, RequestId, HashTree, AgentError
//! ├── algorithms/      # Classifier, retrying executor, poll schedule
//! ├── codec/           # Value, CallSchema, MessagePack wire mapping
//! ├── ports/           # AgentTransport, CertificateVerifier + mocks
//! ├── application/     # CanisterAgent, CanisterClient
//! └── config.rs        # AgentConfig, PollConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algorithms;
pub mod application;
pub mod codec;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use algorithms::{
    ErrorClassifier, MessagePatternClassifier, PollStrategy, RetryPolicy, RetryingQueryExecutor,
};
pub use application::{CanisterAgent, CanisterClient};
pub use codec::{
    validate, CallSchema, Case, Codec, Field, Mismatch, NatWidth, RecordEncoding, Value,
};
pub use config::{AgentConfig, PollConfig};
pub use domain::{
    lookup_request_status, wire_method_name, AgentError, AuthFailure, CallError, CanisterId,
    Direction, ErrorKind, HashTree, LookupResult, PrincipalError, RejectCode, RejectDetails,
    Rejection, RequestId, RequestStatus, SchemaViolation, TransportFailure, MSGPACK_SUFFIX,
};
pub use ports::{
    AgentTransport, CallResponse, CertificateVerifier, MockRequest, MockRequestKind,
    MockResponse, MockTransport, MockVerifier, QueryResponse, SubmittedCall,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
