//! # Binary Protocol Codec
//!
//! MessagePack encoding of call arguments and replies, with structural
//! validation on both sides of the wire.
//!
//! - Outgoing values are validated before encoding; a mismatch is a
//!   programmer error and no bytes are produced.
//! - Incoming bytes are decoded, reshaped toward the schema and validated;
//!   a mismatch is logged with the raw value and surfaced as a
//!   [`SchemaViolation`](crate::domain::SchemaViolation).

pub mod schema;
pub mod value;
pub mod wire;

pub use schema::{validate, CallSchema, Case, Field, Mismatch, NatWidth};
pub use value::Value;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::domain::{AgentError, Direction, SchemaViolation};

/// How records are laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordEncoding {
    /// Array of field values in schema order.
    #[default]
    Positional,
    /// Map of field name to value.
    Named,
}

/// Schema-validating MessagePack codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec {
    encoding: RecordEncoding,
}

impl Codec {
    /// Codec writing records with `encoding`. Decoding accepts both layouts.
    pub fn new(encoding: RecordEncoding) -> Self {
        Self { encoding }
    }

    /// Record layout used for encoding.
    pub fn encoding(&self) -> RecordEncoding {
        self.encoding
    }

    /// Validate and encode a request value.
    pub fn encode(&self, value: &Value, schema: &CallSchema) -> Result<Vec<u8>, AgentError> {
        validate(value, schema).map_err(|m| violation(Direction::Request, m, None))?;

        let wire = wire::to_wire(value, schema, self.encoding);
        let mut out = Vec::new();
        rmpv::encode::write_value(&mut out, &wire)
            .map_err(|e| AgentError::transient(format!("MessagePack encoding failed: {e}")))?;
        Ok(out)
    }

    /// Decode and validate a response payload.
    pub fn decode(&self, bytes: &[u8], schema: &CallSchema) -> Result<Value, AgentError> {
        let mut reader = bytes;
        let raw = rmpv::decode::read_value(&mut reader).map_err(|e| {
            error!("[oc-01] Undecodable response ({} bytes): {}", bytes.len(), e);
            violation(
                Direction::Response,
                Mismatch {
                    path: "$".to_string(),
                    expected: "MessagePack value".to_string(),
                    found: format!("malformed bytes ({e})"),
                },
                Some(hex::encode(bytes)),
            )
        })?;
        if !reader.is_empty() {
            error!(
                "[oc-01] Response has {} trailing bytes after the MessagePack value",
                reader.len()
            );
            return Err(violation(
                Direction::Response,
                Mismatch {
                    path: "$".to_string(),
                    expected: "single MessagePack value".to_string(),
                    found: format!("{} trailing bytes", reader.len()),
                },
                Some(hex::encode(bytes)),
            ));
        }

        let value = wire::conform(wire::from_wire(raw.clone()), schema);
        if let Err(mismatch) = validate(&value, schema) {
            error!(
                path = %mismatch.path,
                expected = %mismatch.expected,
                found = %mismatch.found,
                raw = %raw,
                "[oc-01] Response failed schema validation"
            );
            return Err(violation(Direction::Response, mismatch, Some(raw.to_string())));
        }
        Ok(value)
    }
}

fn violation(direction: Direction, mismatch: Mismatch, raw: Option<String>) -> AgentError {
    AgentError::SchemaViolation(Box::new(SchemaViolation {
        direction,
        path: mismatch.path,
        expected: mismatch.expected,
        found: mismatch.found,
        raw,
    }))
}
