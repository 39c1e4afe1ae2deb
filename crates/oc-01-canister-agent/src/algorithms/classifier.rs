//! # Error Classifier
//!
//! Maps raw transport failures to the closed [`AgentError`] taxonomy.
//!
//! The transport only reports human-readable text, so classification is a
//! set of regular expressions over the message. All of that lives behind
//! [`ErrorClassifier`]; a transport exposing structured codes only needs a
//! new implementation of the trait.

use lazy_static::lazy_static;
use regex::Regex;

use crate::domain::{AgentError, AuthFailure, TransportFailure};

/// Status code reported when none can be parsed.
pub const DEFAULT_STATUS: u16 = 500;

lazy_static! {
    static ref DESTINATION_INVALID: Regex =
        Regex::new(r"(?i)destination\s*invalid|canister\s+\S+\s+not\s+found")
            .expect("Failed to compile DESTINATION_INVALID pattern");
    static ref REPLICA_LAGGING: Regex =
        Regex::new(r"(?i)replica\s+(?:is\s+)?not\s+up\s+to\s+date|certificate\s+is\s+stale|replica\s+lagging")
            .expect("Failed to compile REPLICA_LAGGING pattern");
    static ref PAYLOAD_TOO_LARGE: Regex = Regex::new(
        r"(?i)(?:payload|response|reply)\s*(?:size|too\s+large)[^\d]*(\d+)[^\d]+(\d+)"
    )
    .expect("Failed to compile PAYLOAD_TOO_LARGE pattern");
    static ref INVALID_DELEGATION: Regex =
        Regex::new(r"(?i)invalid\s+delegation|delegation\s+(?:has\s+)?expired")
            .expect("Failed to compile INVALID_DELEGATION pattern");
    static ref STATUS_LINE: Regex =
        Regex::new(r"(?im)^\s*(?:http\s+status\s+code|code)\s*:\s*(\d{3})")
            .expect("Failed to compile STATUS_LINE pattern");
}

/// Turns a raw failure into a classified error.
pub trait ErrorClassifier: Send + Sync {
    /// Classify one failure.
    fn classify(&self, failure: &TransportFailure) -> AgentError;
}

/// Classifier driven by message patterns.
///
/// Precedence: destination, delegation, payload size, lagging replica, then
/// the HTTP status (401/403 are authorization failures, anything else is
/// transient).
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePatternClassifier;

impl MessagePatternClassifier {
    /// New classifier.
    pub fn new() -> Self {
        Self
    }

    /// Status from the failure, falling back to the message text.
    fn status_of(failure: &TransportFailure) -> Option<u16> {
        failure.status.or_else(|| {
            STATUS_LINE
                .captures(&failure.message)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok())
        })
    }
}

impl ErrorClassifier for MessagePatternClassifier {
    fn classify(&self, failure: &TransportFailure) -> AgentError {
        let message = failure.message.clone();

        if DESTINATION_INVALID.is_match(&message) {
            return AgentError::DestinationUnreachable { message };
        }
        if INVALID_DELEGATION.is_match(&message) {
            return AgentError::AuthorizationFailed {
                reason: AuthFailure::InvalidDelegation,
                message,
            };
        }
        if let Some(caps) = PAYLOAD_TOO_LARGE.captures(&message) {
            let size = caps.get(1).and_then(|m| m.as_str().parse().ok());
            let limit = caps.get(2).and_then(|m| m.as_str().parse().ok());
            if let (Some(size), Some(limit)) = (size, limit) {
                return AgentError::ResponsePayloadTooLarge { size, limit };
            }
        }
        if REPLICA_LAGGING.is_match(&message) {
            return AgentError::ReplicaLagging { message };
        }

        match Self::status_of(failure) {
            Some(code @ (401 | 403)) => AgentError::AuthorizationFailed {
                reason: AuthFailure::Status(code),
                message,
            },
            code => AgentError::Transient {
                code: code.unwrap_or(DEFAULT_STATUS),
                message,
            },
        }
    }
}
