//! Dynamic values exchanged with canisters.

use std::collections::BTreeMap;
use std::fmt;

/// Byte strings longer than this are elided in [`Value`]'s display form.
const DISPLAY_BYTES_LIMIT: usize = 16;

/// A call argument or reply, before mapping to domain types.
///
/// An absent record field is a missing map entry, never `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Nil.
    Null,
    /// Boolean.
    Bool(bool),
    /// Unsigned integer, up to 128 bits.
    Nat(u128),
    /// Signed integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Homogeneous sequence.
    Array(Vec<Value>),
    /// Record keyed by field name.
    Record(BTreeMap<String, Value>),
    /// Tagged union case with optional payload.
    Variant(String, Option<Box<Value>>),
}

impl Value {
    /// Record from `(name, value)` pairs.
    ///
    /// `Null` entries are dropped, so `Value::optional(None)` leaves the
    /// field absent.
    pub fn record<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Record(
            fields
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.into(), v))
                .collect(),
        )
    }

    /// Variant case.
    pub fn variant(tag: impl Into<String>, payload: Option<Value>) -> Self {
        Value::Variant(tag.into(), payload.map(Box::new))
    }

    /// `Some(v)` becomes `v`, `None` becomes `Null`.
    pub fn optional(value: Option<Value>) -> Self {
        value.unwrap_or(Value::Null)
    }

    /// Record field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.get(name),
            _ => None,
        }
    }

    /// Natural number.
    pub fn as_nat(&self) -> Option<u128> {
        match self {
            Value::Nat(n) => Some(*n),
            _ => None,
        }
    }

    /// Text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Variant tag and payload.
    pub fn as_variant(&self) -> Option<(&str, Option<&Value>)> {
        match self {
            Value::Variant(tag, payload) => Some((tag, payload.as_deref())),
            _ => None,
        }
    }

    /// Whether this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short description used in schema violations.
    pub(crate) fn describe(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Nat(n) => format!("nat {n}"),
            Value::Int(i) => format!("int {i}"),
            Value::Float(_) => "float".to_string(),
            Value::Text(_) => "text".to_string(),
            Value::Bytes(b) => format!("bytes[{}]", b.len()),
            Value::Array(items) => format!("array[{}]", items.len()),
            Value::Record(_) => "record".to_string(),
            Value::Variant(tag, _) => format!("variant {tag}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Nat(n) => write!(f, "{n}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Bytes(b) if b.len() > DISPLAY_BYTES_LIMIT => write!(f, "<{} bytes>", b.len()),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Record(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
            Value::Variant(tag, None) => f.write_str(tag),
            Value::Variant(tag, Some(payload)) => write!(f, "{tag}({payload})"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Nat(u128::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Nat(u128::from(v))
    }
}

impl From<u128> for Value {
    fn from(v: u128) -> Self {
        Value::Nat(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
