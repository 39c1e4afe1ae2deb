//! # Value Objects
//!
//! Immutable identifiers used on every call: the remote call target, the
//! correlation id of a submitted update, and the platform reject codes.

use candid::types::principal::PrincipalError as CandidPrincipalError;
use candid::Principal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Suffix that selects the MessagePack flavour of a canister method.
pub const MSGPACK_SUFFIX: &str = "_msgpack";

/// Wire name of a logical method (`foo` is invoked as `foo_msgpack`).
pub fn wire_method_name(method: &str) -> String {
    format!("{method}{MSGPACK_SUFFIX}")
}

/// Errors produced while parsing a canister id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrincipalError {
    /// Raw principal exceeds the platform maximum.
    #[error("Principal too long: {0} bytes (max {max})", max = CanisterId::MAX_LENGTH)]
    TooLong(usize),

    /// Text is not valid base32.
    #[error("Principal text is not valid base32")]
    InvalidEncoding,

    /// Text too short to hold the checksum.
    #[error("Principal text too short")]
    TooShort,

    /// Text longer than any principal can encode to.
    #[error("Principal text too long")]
    TextTooLong,

    /// CRC32 prefix does not match the principal bytes.
    #[error("Principal checksum mismatch")]
    ChecksumMismatch,

    /// Grouping or case does not match the canonical form.
    #[error("Principal text is not in canonical form, expected {0}")]
    NotCanonical(String),
}

impl From<CandidPrincipalError> for PrincipalError {
    fn from(error: CandidPrincipalError) -> Self {
        match error {
            CandidPrincipalError::BytesTooLong() => Self::TooLong(CanisterId::MAX_LENGTH + 1),
            CandidPrincipalError::InvalidBase32() => Self::InvalidEncoding,
            CandidPrincipalError::TextTooShort() => Self::TooShort,
            CandidPrincipalError::TextTooLong() => Self::TextTooLong,
            CandidPrincipalError::CheckSequenceNotMatch() => Self::ChecksumMismatch,
            CandidPrincipalError::AbnormalGrouped(expected) => {
                Self::NotCanonical(expected.to_text())
            }
        }
    }
}

/// Identifies a canister (remote process) against which calls are issued.
///
/// Wraps a platform [`Principal`]. The textual form is
/// `base32(crc32 || bytes)` in dash-separated groups of five.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanisterId(Principal);

impl CanisterId {
    /// Maximum length of a raw principal.
    pub const MAX_LENGTH: usize = 29;

    /// The management canister (`aaaaa-aa`).
    pub fn management() -> Self {
        Self(Principal::management_canister())
    }

    /// Build from raw principal bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PrincipalError> {
        if bytes.len() > Self::MAX_LENGTH {
            return Err(PrincipalError::TooLong(bytes.len()));
        }
        Ok(Self(Principal::try_from_slice(bytes)?))
    }

    /// Parse the textual form, validating checksum and grouping.
    pub fn from_text(text: &str) -> Result<Self, PrincipalError> {
        Ok(Self(Principal::from_text(text)?))
    }

    /// Raw principal bytes, as sent on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// Underlying principal.
    pub fn principal(&self) -> Principal {
        self.0
    }

    /// Canonical textual form.
    pub fn to_text(&self) -> String {
        self.0.to_text()
    }
}

impl From<Principal> for CanisterId {
    fn from(principal: Principal) -> Self {
        Self(principal)
    }
}

impl fmt::Display for CanisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for CanisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CanisterId({})", self.to_text())
    }
}

impl FromStr for CanisterId {
    type Err = PrincipalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_text(s)
    }
}

impl TryFrom<String> for CanisterId {
    type Error = PrincipalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_text(&value)
    }
}

impl From<CanisterId> for String {
    fn from(id: CanisterId) -> Self {
        id.to_text()
    }
}

/// Correlation identifier issued when an update call is submitted.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId([u8; 32]);

impl RequestId {
    /// Wrap raw request id bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes, used as a certificate path segment.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", hex::encode(&self.0[..8]))
    }
}

/// Platform reject code classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectCode {
    /// Fatal system error, retry unlikely to help.
    SysFatal,
    /// Transient system error.
    SysTransient,
    /// Destination canister does not exist or is invalid.
    DestinationInvalid,
    /// Explicit reject by the canister code.
    CanisterReject,
    /// Canister trapped or ran out of resources.
    CanisterError,
    /// Code outside the known classes.
    Unknown(u64),
}

impl RejectCode {
    /// Map a numeric reject code.
    pub fn from_code(code: u64) -> Self {
        match code {
            1 => Self::SysFatal,
            2 => Self::SysTransient,
            3 => Self::DestinationInvalid,
            4 => Self::CanisterReject,
            5 => Self::CanisterError,
            other => Self::Unknown(other),
        }
    }

    /// Numeric reject code.
    pub fn code(&self) -> u64 {
        match self {
            Self::SysFatal => 1,
            Self::SysTransient => 2,
            Self::DestinationInvalid => 3,
            Self::CanisterReject => 4,
            Self::CanisterError => 5,
            Self::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for RejectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "Unknown ({code})"),
            known => write!(f, "{known:?} ({})", known.code()),
        }
    }
}
