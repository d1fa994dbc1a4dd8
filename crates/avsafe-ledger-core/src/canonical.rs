//! Canonical JSON encoding for deterministic hashing and signing.
//!
//! Rules:
//! - Object keys sorted by their UTF-8 bytes
//! - No insignificant whitespace (`,` and `:` separators only)
//! - Non-ASCII text emitted literally, never `\u`-escaped
//! - Integers and floats kept distinct; floats in shortest round-trip form
//! - NaN and infinities rejected
//! - Arrays keep their input order
//!
//! **CRITICAL**: This encoding is FROZEN. Changing it invalidates every
//! chain hash and signature ever produced.

use crate::error::{CoreError, Result};
use crate::record::Payload;
use crate::value::{Object, Value};

/// Encode a value to canonical bytes.
pub fn canonicalize(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

/// Encode a payload (an object without the `chain` key) to canonical bytes.
pub fn canonical_payload(payload: &Payload) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_object(&mut buf, payload.as_object())?;
    Ok(buf)
}

/// Canonical bytes as a `String`; the encoding is always valid UTF-8.
pub fn canonical_string(value: &Value) -> Result<String> {
    let bytes = canonicalize(value)?;
    String::from_utf8(bytes).map_err(|e| CoreError::Encoding(e.to_string()))
}

/// Recursively encode a value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Null => buf.extend_from_slice(b"null"),
        Value::Bool(b) => buf.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Int(i) => buf.extend_from_slice(i.to_string().as_bytes()),
        Value::UInt(u) => buf.extend_from_slice(u.to_string().as_bytes()),
        Value::Float(f) => encode_float(buf, *f)?,
        Value::String(s) => encode_text(buf, s)?,
        Value::Array(items) => {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                encode_value_to(buf, item)?;
            }
            buf.push(b']');
        }
        Value::Object(map) => encode_object(buf, map)?,
    }
    Ok(())
}

/// Encode an object. `BTreeMap<String, _>` iterates in byte order already.
fn encode_object(buf: &mut Vec<u8>, map: &Object) -> Result<()> {
    buf.push(b'{');
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            buf.push(b',');
        }
        encode_text(buf, key)?;
        buf.push(b':');
        encode_value_to(buf, value)?;
    }
    buf.push(b'}');
    Ok(())
}

/// Encode a float, refusing anything interoperable JSON cannot carry.
fn encode_float(buf: &mut Vec<u8>, f: f64) -> Result<()> {
    if !f.is_finite() {
        return Err(CoreError::Encoding(format!(
            "non-finite float {} cannot be canonicalized",
            f
        )));
    }
    // serde_json formats finite floats with ryu: `70.0`, `0.1`, `1e-7`.
    serde_json::to_writer(&mut *buf, &f).map_err(|e| CoreError::Encoding(e.to_string()))
}

/// Encode a string. serde_json escapes only `"`, `\` and C0 controls.
fn encode_text(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    serde_json::to_writer(&mut *buf, s).map_err(|e| CoreError::Encoding(e.to_string()))
}
