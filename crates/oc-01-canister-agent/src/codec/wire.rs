//! Conversion between [`Value`] and MessagePack.
//!
//! Encoding is schema-guided: records become positional arrays (or named
//! maps), unit variants become their tag string and payload variants a
//! single-entry map. Decoding is lenient first ([`from_wire`]), then
//! [`conform`] reshapes the raw value toward the schema so validation sees
//! the same structure callers built.

use std::collections::BTreeMap;

use rmpv::Value as Wire;

use super::schema::{CallSchema, Field};
use super::value::Value;
use super::RecordEncoding;

/// Encode a validated value.
pub fn to_wire(value: &Value, schema: &CallSchema, encoding: RecordEncoding) -> Wire {
    match (schema, value) {
        (CallSchema::Optional(_), Value::Null) => Wire::Nil,
        (CallSchema::Optional(inner), _) => to_wire(value, inner, encoding),
        (CallSchema::Array(inner), Value::Array(items)) => Wire::Array(
            items
                .iter()
                .map(|item| to_wire(item, inner, encoding))
                .collect(),
        ),
        (CallSchema::Record(fields), Value::Record(map)) => record_to_wire(fields, map, encoding),
        (CallSchema::Variant(_), Value::Variant(tag, payload)) => {
            let case_schema = schema.case(tag).and_then(|c| c.payload.as_ref());
            match (payload, case_schema) {
                (None, _) => Wire::from(tag.as_str()),
                (Some(p), Some(s)) => {
                    Wire::Map(vec![(Wire::from(tag.as_str()), to_wire(p, s, encoding))])
                }
                (Some(p), None) => Wire::Map(vec![(Wire::from(tag.as_str()), untyped(p))]),
            }
        }
        _ => untyped(value),
    }
}

fn record_to_wire(fields: &[Field], map: &BTreeMap<String, Value>, encoding: RecordEncoding) -> Wire {
    match encoding {
        RecordEncoding::Named => Wire::Map(
            fields
                .iter()
                .filter_map(|field| {
                    map.get(&field.name)
                        .filter(|v| !(v.is_null() && field.schema.is_optional()))
                        .map(|v| (Wire::from(field.name.as_str()), to_wire(v, &field.schema, encoding)))
                })
                .collect(),
        ),
        RecordEncoding::Positional => {
            let mut items: Vec<Wire> = fields
                .iter()
                .map(|field| match map.get(&field.name) {
                    Some(v) => to_wire(v, &field.schema, encoding),
                    None => Wire::Nil,
                })
                .collect();
            // Trailing absent optionals are omitted entirely.
            while let Some(last) = items.len().checked_sub(1) {
                if !(items[last].is_nil() && fields[last].schema.is_optional()) {
                    break;
                }
                items.pop();
            }
            Wire::Array(items)
        }
    }
}

/// Encode without a schema; records become named maps.
fn untyped(value: &Value) -> Wire {
    match value {
        Value::Null => Wire::Nil,
        Value::Bool(b) => Wire::Boolean(*b),
        Value::Nat(n) => nat_to_wire(*n),
        Value::Int(i) => Wire::from(*i),
        Value::Float(x) => Wire::F64(*x),
        Value::Text(s) => Wire::from(s.as_str()),
        Value::Bytes(b) => Wire::Binary(b.clone()),
        Value::Array(items) => Wire::Array(items.iter().map(untyped).collect()),
        Value::Record(map) => Wire::Map(
            map.iter()
                .map(|(k, v)| (Wire::from(k.as_str()), untyped(v)))
                .collect(),
        ),
        Value::Variant(tag, None) => Wire::from(tag.as_str()),
        Value::Variant(tag, Some(p)) => Wire::Map(vec![(Wire::from(tag.as_str()), untyped(p))]),
    }
}

/// Naturals beyond 64 bits travel as decimal strings.
fn nat_to_wire(n: u128) -> Wire {
    match u64::try_from(n) {
        Ok(small) => Wire::from(small),
        Err(_) => Wire::from(n.to_string()),
    }
}

/// Lift raw MessagePack into a [`Value`] without any schema knowledge.
pub fn from_wire(wire: Wire) -> Value {
    match wire {
        Wire::Nil => Value::Null,
        Wire::Boolean(b) => Value::Bool(b),
        Wire::Integer(i) => match (i.as_u64(), i.as_i64()) {
            (Some(n), _) => Value::Nat(u128::from(n)),
            (None, Some(n)) => Value::Int(n),
            (None, None) => Value::Null,
        },
        Wire::F32(x) => Value::Float(f64::from(x)),
        Wire::F64(x) => Value::Float(x),
        Wire::String(s) => match s.into_str() {
            Some(text) => Value::Text(text),
            None => Value::Null,
        },
        Wire::Binary(b) => Value::Bytes(b),
        Wire::Array(items) => Value::Array(items.into_iter().map(from_wire).collect()),
        Wire::Map(entries) => Value::Record(
            entries
                .into_iter()
                .map(|(k, v)| {
                    let key = match k {
                        Wire::String(s) => s.into_str().unwrap_or_default(),
                        other => other.to_string(),
                    };
                    (key, from_wire(v))
                })
                .collect(),
        ),
        Wire::Ext(_, data) => Value::Bytes(data),
    }
}

/// Reshape a raw decoded value toward `schema`.
///
/// Only lossless coercions are applied; anything that still does not fit is
/// left for validation to report.
pub fn conform(value: Value, schema: &CallSchema) -> Value {
    match (schema, value) {
        (CallSchema::Any, v) => v,
        (CallSchema::Nat(_), Value::Text(s)) => match s.parse::<u128>() {
            Ok(n) => Value::Nat(n),
            Err(_) => Value::Text(s),
        },
        (CallSchema::Int, Value::Nat(n)) => match i64::try_from(n) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::Nat(n),
        },
        (CallSchema::Float, Value::Nat(n)) => Value::Float(n as f64),
        (CallSchema::Float, Value::Int(i)) => Value::Float(i as f64),
        (CallSchema::Bytes { .. }, Value::Array(items)) => bytes_from_array(items),
        (CallSchema::Array(inner), Value::Array(items)) => {
            Value::Array(items.into_iter().map(|v| conform(v, inner)).collect())
        }
        (CallSchema::Optional(_), Value::Null) => Value::Null,
        (CallSchema::Optional(inner), v) => conform(v, inner),
        (CallSchema::Record(fields), Value::Array(items)) => {
            let mut map = BTreeMap::new();
            for (field, item) in fields.iter().zip(items) {
                if item.is_null() && field.schema.is_optional() {
                    continue;
                }
                map.insert(field.name.clone(), conform(item, &field.schema));
            }
            Value::Record(map)
        }
        (CallSchema::Record(fields), Value::Record(mut raw)) => {
            let mut map = BTreeMap::new();
            for field in fields {
                match raw.remove(&field.name) {
                    Some(v) if v.is_null() && field.schema.is_optional() => {}
                    Some(v) => {
                        map.insert(field.name.clone(), conform(v, &field.schema));
                    }
                    None => {}
                }
            }
            Value::Record(map)
        }
        (CallSchema::Variant(_), Value::Text(tag)) => Value::Variant(tag, None),
        (CallSchema::Variant(_), Value::Record(raw)) if raw.len() == 1 => {
            let Some((tag, payload)) = raw.into_iter().next() else {
                return Value::Null;
            };
            match schema.case(&tag).map(|c| c.payload.as_ref()) {
                Some(None) if payload.is_null() => Value::Variant(tag, None),
                Some(Some(inner)) => Value::Variant(tag, Some(Box::new(conform(payload, inner)))),
                _ => Value::Variant(tag, Some(Box::new(payload))),
            }
        }
        (_, v) => v,
    }
}

fn bytes_from_array(items: Vec<Value>) -> Value {
    let bytes: Option<Vec<u8>> = items
        .iter()
        .map(|v| v.as_nat().and_then(|n| u8::try_from(n).ok()))
        .collect();
    match bytes {
        Some(bytes) => Value::Bytes(bytes),
        None => Value::Array(items),
    }
}
