//! # Domain Errors
//!
//! Closed error taxonomy for canister calls. Raw transport failures enter as
//! [`TransportFailure`] and leave the classifier as an [`AgentError`].

use std::fmt;
use thiserror::Error;

use super::value_objects::{CanisterId, RejectCode, RequestId};

/// Raw, unclassified failure reported by the transport.
///
/// The transport only exposes human-readable text (and sometimes an HTTP
/// status), so classification works on `message`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportFailure {
    /// Failure text as produced by the transport.
    pub message: String,
    /// HTTP status, when the transport surfaced one.
    pub status: Option<u16>,
}

impl TransportFailure {
    /// Failure with message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    /// Failure carrying an HTTP status.
    pub fn with_status(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }
}

/// Discriminant of [`AgentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Destination principal invalid.
    DestinationUnreachable,
    /// 401/403 or invalid delegation.
    AuthorizationFailed,
    /// Reply exceeded the transport size limit.
    ResponsePayloadTooLarge,
    /// Replica behind the required timestamp.
    ReplicaLagging,
    /// Canister or platform rejected the call.
    RemoteRejected,
    /// Request or response failed structural validation.
    SchemaViolation,
    /// Update never reached a terminal certified state.
    TimedOut,
    /// Anything else.
    Transient,
}

impl ErrorKind {
    /// Only lagging replicas and transient failures are retried.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::ReplicaLagging | Self::Transient)
    }
}

/// Reason for an authorization failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    /// HTTP 401 or 403.
    Status(u16),
    /// Sender delegation chain expired or invalid.
    InvalidDelegation,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "status {code}"),
            Self::InvalidDelegation => f.write_str("invalid delegation"),
        }
    }
}

/// Which side of a call failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Outgoing arguments (programmer error).
    Request,
    /// Incoming reply (protocol drift).
    Response,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => f.write_str("Request"),
            Self::Response => f.write_str("Response"),
        }
    }
}

/// First structural mismatch between a value and its schema.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{direction} schema violation at {path}: expected {expected}, found {found}")]
pub struct SchemaViolation {
    /// Request or response.
    pub direction: Direction,
    /// Path of the mismatch, e.g. `$.accessors[2]`.
    pub path: String,
    /// What the schema expected.
    pub expected: String,
    /// What was found.
    pub found: String,
    /// Raw decoded value (responses only).
    pub raw: Option<String>,
}

/// Rejection details carried by [`AgentError::RemoteRejected`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectDetails {
    /// Canister that rejected.
    pub target: CanisterId,
    /// Logical method name.
    pub method: String,
    /// Correlation id, for update calls.
    pub request_id: Option<RequestId>,
    /// Reject code.
    pub reject_code: RejectCode,
    /// Human-readable reject message.
    pub reject_message: String,
    /// Optional machine error code, e.g. `IC0503`.
    pub error_code: Option<String>,
    /// Copy of the raw platform response.
    pub raw_response: String,
}

impl fmt::Display for RejectDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} rejected with {}: {}",
            self.target, self.method, self.reject_code, self.reject_message
        )?;
        if let Some(code) = &self.error_code {
            write!(f, " [{code}]")?;
        }
        Ok(())
    }
}

/// Classified canister call error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentError {
    /// Destination principal invalid. Never retried.
    #[error("Destination unreachable: {message}")]
    DestinationUnreachable {
        /// Transport message.
        message: String,
    },

    /// Authorization failed. Never retried.
    #[error("Authorization failed ({reason}): {message}")]
    AuthorizationFailed {
        /// Status code or delegation problem.
        reason: AuthFailure,
        /// Transport message.
        message: String,
    },

    /// Reply exceeded the size limit. Never retried.
    #[error("Response payload too large: {size} bytes exceeds limit of {limit}")]
    ResponsePayloadTooLarge {
        /// Reported payload size.
        size: u64,
        /// Reported limit.
        limit: u64,
    },

    /// Replica has not caught up yet. Retried with backoff.
    #[error("Replica lagging: {message}")]
    ReplicaLagging {
        /// Transport message.
        message: String,
    },

    /// Call rejected by the canister or platform.
    #[error("{0}")]
    RemoteRejected(Box<RejectDetails>),

    /// Structural validation failed.
    #[error(transparent)]
    SchemaViolation(Box<SchemaViolation>),

    /// Poll loop gave up before a terminal state.
    #[error("Request {request_id} not certified after {elapsed_ms}ms")]
    TimedOut {
        /// Correlation id being polled.
        request_id: RequestId,
        /// Time spent polling.
        elapsed_ms: u64,
    },

    /// Anything else. Retried with backoff.
    #[error("Transient failure (code {code}): {message}")]
    Transient {
        /// Parsed status code, 500 when none.
        code: u16,
        /// Transport message.
        message: String,
    },
}

impl AgentError {
    /// Discriminant.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DestinationUnreachable { .. } => ErrorKind::DestinationUnreachable,
            Self::AuthorizationFailed { .. } => ErrorKind::AuthorizationFailed,
            Self::ResponsePayloadTooLarge { .. } => ErrorKind::ResponsePayloadTooLarge,
            Self::ReplicaLagging { .. } => ErrorKind::ReplicaLagging,
            Self::RemoteRejected(_) => ErrorKind::RemoteRejected,
            Self::SchemaViolation(_) => ErrorKind::SchemaViolation,
            Self::TimedOut { .. } => ErrorKind::TimedOut,
            Self::Transient { .. } => ErrorKind::Transient,
        }
    }

    /// Whether the retrying executor may try again.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Transient failure with the default 500 code.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            code: 500,
            message: message.into(),
        }
    }

    /// Response-side schema violation, for mappers that find a malformed reply.
    pub fn response_mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::SchemaViolation(Box::new(SchemaViolation {
            direction: Direction::Response,
            path: path.into(),
            expected: expected.into(),
            found: found.into(),
            raw: None,
        }))
    }

    /// Rejection details, if this is a rejection.
    pub fn reject_details(&self) -> Option<&RejectDetails> {
        match self {
            Self::RemoteRejected(details) => Some(details),
            _ => None,
        }
    }
}

/// An [`AgentError`] with the call it came from, for diagnosis.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{method} on {target} failed: {error}")]
pub struct CallError {
    /// Canister called.
    pub target: CanisterId,
    /// Logical method name.
    pub method: String,
    /// Compact rendering of the arguments.
    pub args: String,
    /// Classified error.
    #[source]
    pub error: AgentError,
}

impl CallError {
    /// Discriminant of the inner error.
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}
