//! Call schemas and structural validation.

use super::value::Value;

/// Width limit of a natural number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NatWidth {
    /// 8 bits.
    U8,
    /// 16 bits.
    U16,
    /// 32 bits.
    U32,
    /// 64 bits.
    U64,
    /// 128 bits.
    U128,
}

impl NatWidth {
    /// Largest accepted value.
    pub fn max(self) -> u128 {
        match self {
            Self::U8 => u128::from(u8::MAX),
            Self::U16 => u128::from(u16::MAX),
            Self::U32 => u128::from(u32::MAX),
            Self::U64 => u128::from(u64::MAX),
            Self::U128 => u128::MAX,
        }
    }

    fn bits(self) -> u32 {
        match self {
            Self::U8 => 8,
            Self::U16 => 16,
            Self::U32 => 32,
            Self::U64 => 64,
            Self::U128 => 128,
        }
    }
}

/// Named record field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name.
    pub name: String,
    /// Field schema. An `Optional` field may be absent.
    pub schema: CallSchema,
}

/// Tagged union case.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    /// Case tag.
    pub tag: String,
    /// Payload schema, `None` for unit cases.
    pub payload: Option<CallSchema>,
}

/// Accepted shape of a request or response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum CallSchema {
    /// Anything.
    Any,
    /// Nil only.
    Null,
    /// Boolean.
    Bool,
    /// Natural number of bounded width.
    Nat(NatWidth),
    /// Signed 64-bit integer.
    Int,
    /// Floating point.
    Float,
    /// UTF-8 text.
    Text,
    /// Byte string, optionally of fixed length.
    Bytes {
        /// Required length.
        len: Option<usize>,
    },
    /// Sequence of one element schema.
    Array(Box<CallSchema>),
    /// Nil or the inner schema.
    Optional(Box<CallSchema>),
    /// Record with ordered fields.
    Record(Vec<Field>),
    /// Tagged union.
    Variant(Vec<Case>),
}

impl CallSchema {
    /// Record from `(name, schema)` pairs, in wire order.
    pub fn record<'a>(fields: impl IntoIterator<Item = (&'a str, CallSchema)>) -> Self {
        CallSchema::Record(
            fields
                .into_iter()
                .map(|(name, schema)| Field {
                    name: name.to_string(),
                    schema,
                })
                .collect(),
        )
    }

    /// Variant from `(tag, payload)` pairs.
    pub fn variant<'a>(cases: impl IntoIterator<Item = (&'a str, Option<CallSchema>)>) -> Self {
        CallSchema::Variant(
            cases
                .into_iter()
                .map(|(tag, payload)| Case {
                    tag: tag.to_string(),
                    payload,
                })
                .collect(),
        )
    }

    /// Optional wrapper.
    pub fn optional(inner: CallSchema) -> Self {
        CallSchema::Optional(Box::new(inner))
    }

    /// Array wrapper.
    pub fn array(inner: CallSchema) -> Self {
        CallSchema::Array(Box::new(inner))
    }

    /// Variable-length bytes.
    pub fn bytes() -> Self {
        CallSchema::Bytes { len: None }
    }

    /// Fixed-length bytes.
    pub fn fixed_bytes(len: usize) -> Self {
        CallSchema::Bytes { len: Some(len) }
    }

    /// Whether a record field of this schema may be absent.
    pub fn is_optional(&self) -> bool {
        matches!(self, CallSchema::Optional(_))
    }

    /// Case schema for `tag`.
    pub(crate) fn case(&self, tag: &str) -> Option<&Case> {
        match self {
            CallSchema::Variant(cases) => cases.iter().find(|c| c.tag == tag),
            _ => None,
        }
    }

    /// Short description used in schema violations.
    pub fn describe(&self) -> String {
        match self {
            CallSchema::Any => "any".to_string(),
            CallSchema::Null => "null".to_string(),
            CallSchema::Bool => "bool".to_string(),
            CallSchema::Nat(width) => format!("nat{}", width.bits()),
            CallSchema::Int => "int64".to_string(),
            CallSchema::Float => "float".to_string(),
            CallSchema::Text => "text".to_string(),
            CallSchema::Bytes { len: Some(len) } => format!("bytes[{len}]"),
            CallSchema::Bytes { len: None } => "bytes".to_string(),
            CallSchema::Array(inner) => format!("array of {}", inner.describe()),
            CallSchema::Optional(inner) => format!("optional {}", inner.describe()),
            CallSchema::Record(_) => "record".to_string(),
            CallSchema::Variant(cases) => {
                let tags: Vec<&str> = cases.iter().map(|c| c.tag.as_str()).collect();
                format!("one of [{}]", tags.join(", "))
            }
        }
    }
}

/// First mismatch found by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Path of the mismatch, rooted at `$`.
    pub path: String,
    /// Expected shape.
    pub expected: String,
    /// Found shape.
    pub found: String,
}

/// Check `value` against `schema`, reporting the first mismatch.
pub fn validate(value: &Value, schema: &CallSchema) -> Result<(), Mismatch> {
    check(value, schema, "$")
}

fn mismatch(path: &str, expected: String, found: String) -> Mismatch {
    Mismatch {
        path: path.to_string(),
        expected,
        found,
    }
}

fn check(value: &Value, schema: &CallSchema, path: &str) -> Result<(), Mismatch> {
    match (schema, value) {
        (CallSchema::Any, _) => Ok(()),
        (CallSchema::Null, Value::Null) => Ok(()),
        (CallSchema::Bool, Value::Bool(_)) => Ok(()),
        (CallSchema::Nat(width), Value::Nat(n)) if *n <= width.max() => Ok(()),
        (CallSchema::Int, Value::Int(_)) => Ok(()),
        (CallSchema::Float, Value::Float(_)) => Ok(()),
        (CallSchema::Text, Value::Text(_)) => Ok(()),
        (CallSchema::Bytes { len }, Value::Bytes(bytes)) => match len {
            Some(len) if bytes.len() != *len => {
                Err(mismatch(path, schema.describe(), value.describe()))
            }
            _ => Ok(()),
        },
        (CallSchema::Array(inner), Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                check(item, inner, &format!("{path}[{i}]"))?;
            }
            Ok(())
        }
        (CallSchema::Optional(_), Value::Null) => Ok(()),
        (CallSchema::Optional(inner), _) => check(value, inner, path),
        (CallSchema::Record(fields), Value::Record(map)) => {
            for field in fields {
                let field_path = format!("{path}.{}", field.name);
                match map.get(&field.name) {
                    Some(v) => check(v, &field.schema, &field_path)?,
                    None if field.schema.is_optional() => {}
                    None => {
                        return Err(mismatch(
                            &field_path,
                            field.schema.describe(),
                            "absent".to_string(),
                        ))
                    }
                }
            }
            Ok(())
        }
        (CallSchema::Variant(_), Value::Variant(tag, payload)) => {
            let case = schema
                .case(tag)
                .ok_or_else(|| mismatch(path, schema.describe(), value.describe()))?;
            let case_path = format!("{path}::{tag}");
            match (&case.payload, payload) {
                (None, None) => Ok(()),
                (Some(inner), Some(p)) => check(p, inner, &case_path),
                (Some(inner), None) => Err(mismatch(&case_path, inner.describe(), "absent".to_string())),
                (None, Some(p)) => Err(mismatch(&case_path, "no payload".to_string(), p.describe())),
            }
        }
        _ => Err(mismatch(path, schema.describe(), value.describe())),
    }
}
